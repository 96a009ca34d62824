#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the diagnostics REPL.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build [`Command`]
//! values. Both stages stay allocation-free so the firmware can share them.

use super::catalog::{self, CommandTag};
use crate::alert::AlertPattern;
use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

/// Maximum number of tokens produced per REPL line. Commands remain short and bounded.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the REPL grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Acceleration literal ending in `g`.
    #[regex(r"[0-9]+(?:\.[0-9]+)?g", priority = 2)]
    Magnitude,
    /// Unsuffixed decimal literal.
    #[regex(r"[0-9]+\.[0-9]+")]
    Decimal,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Equals sign for key/value assignments.
    #[token("=")]
    Equals,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidNumber {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidNumber { span } => {
                write!(f, "invalid number at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) if tok.kind != TokenKind::Eol => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                _ => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_number(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidNumber {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];
type ParseResult<'src, T> = Result<T, ErrMode<GrammarError<'src>>>;

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command<'a> {
    Status,
    /// Acceleration magnitude in g.
    Sample(f32),
    Beep(BeepCommand),
    Alert(AlertPattern),
    Schedule(ScheduleCommand),
    Pause,
    Resume,
    Stop {
        all: bool,
    },
    Clear,
    EmergencyMode(bool),
    Fall(FallCommand),
    Thresholds {
        low_g: f32,
        high_g: f32,
    },
    Timing {
        window: Duration,
        cooldown: Duration,
    },
    Smoothing(u8),
    Test,
    Wait(Duration),
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeepCommand {
    Pattern(AlertPattern),
    /// One beep of the given length.
    For(Duration),
    Custom(CustomBeep),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomBeep {
    pub on: Duration,
    pub off: Duration,
    pub repeat: Option<u8>,
    pub pause: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleCommand {
    After {
        delay: Duration,
        pattern: AlertPattern,
    },
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallCommand {
    Reset,
    Simulate,
    SelfTest,
    Calibrate,
    Commit,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

const ALERT_CHOICES: [(&str, AlertPattern); 5] = [
    ("emergency", AlertPattern::Emergency),
    ("warning", AlertPattern::Warning),
    ("success", AlertPattern::Success),
    ("error", AlertPattern::Error),
    ("sos", AlertPattern::Sos),
];

const SWITCH_CHOICES: [(&str, bool); 2] = [("on", true), ("off", false)];

const FALL_CHOICES: [(&str, FallCommand); 6] = [
    ("reset", FallCommand::Reset),
    ("simulate", FallCommand::Simulate),
    ("selftest", FallCommand::SelfTest),
    ("calibrate", FallCommand::Calibrate),
    ("commit", FallCommand::Commit),
    ("cancel", FallCommand::Cancel),
];

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
///
/// # Errors
///
/// Returns [`LexError`] when the line holds more than [`MAX_TOKENS`] tokens.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, span)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: MAX_TOKENS + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a REPL command from the provided line.
///
/// # Errors
///
/// Returns [`ParseError`] for unsupported characters, unknown keywords,
/// malformed literals and trailing input.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        let Some(spec) = catalog::find(command_token.lexeme) else {
            *input = snapshot;
            return Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&command_token),
            )));
        };

        match spec.tag {
            CommandTag::Status => Ok(Command::Status),
            CommandTag::Sample => Ok(Command::Sample(magnitude(input)?)),
            CommandTag::Beep => beep(input).map(Command::Beep),
            CommandTag::Alert => choice(input, "alert pattern", &ALERT_CHOICES).map(Command::Alert),
            CommandTag::Schedule => schedule(input).map(Command::Schedule),
            CommandTag::Pause => Ok(Command::Pause),
            CommandTag::Resume => Ok(Command::Resume),
            CommandTag::Stop => {
                let all = match peek_ident(input) {
                    Some(word) if word.eq_ignore_ascii_case("all") => {
                        advance(input);
                        true
                    }
                    _ => false,
                };
                Ok(Command::Stop { all })
            }
            CommandTag::Clear => Ok(Command::Clear),
            CommandTag::EmergencyMode => {
                choice(input, "on or off", &SWITCH_CHOICES).map(Command::EmergencyMode)
            }
            CommandTag::Fall => choice(input, "fall action", &FALL_CHOICES).map(Command::Fall),
            CommandTag::Thresholds => Ok(Command::Thresholds {
                low_g: magnitude(input)?,
                high_g: magnitude(input)?,
            }),
            CommandTag::Timing => Ok(Command::Timing {
                window: duration(input)?,
                cooldown: duration(input)?,
            }),
            CommandTag::Smoothing => Ok(Command::Smoothing(integer(input)?)),
            CommandTag::Test => Ok(Command::Test),
            CommandTag::Wait => Ok(Command::Wait(duration(input)?)),
            CommandTag::Help => {
                let topic = peek_ident(input);
                if topic.is_some() {
                    advance(input);
                }
                Ok(Command::Help(HelpCommand { topic }))
            }
        }
    }
}

fn beep<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, BeepCommand>
where
    'src: 'slice,
{
    match input.first() {
        None => Ok(BeepCommand::Pattern(AlertPattern::Single)),
        Some(token) if token.kind == TokenKind::Eol => {
            Ok(BeepCommand::Pattern(AlertPattern::Single))
        }
        Some(token) if token.kind == TokenKind::Duration => {
            Ok(BeepCommand::For(duration(input)?))
        }
        Some(_) => {
            let requested = pattern(input)?;
            let custom_timing = input
                .first()
                .is_some_and(|token| token.kind == TokenKind::Duration);
            if requested == AlertPattern::Custom && custom_timing {
                custom_beep(input).map(BeepCommand::Custom)
            } else {
                Ok(BeepCommand::Pattern(requested))
            }
        }
    }
}

fn custom_beep<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, CustomBeep>
where
    'src: 'slice,
{
    let mut custom = CustomBeep {
        on: duration(input)?,
        off: duration(input)?,
        repeat: None,
        pause: None,
    };

    while let Some(key) = peek_ident(input) {
        let key_token = expect_kind(TokenKind::Ident, "assignment").parse_next(input)?;
        expect_kind(TokenKind::Equals, "=").parse_next(input)?;
        if key.eq_ignore_ascii_case("repeat") {
            custom.repeat = Some(integer(input)?);
        } else if key.eq_ignore_ascii_case("pause") {
            custom.pause = Some(duration(input)?);
        } else {
            return Err(ErrMode::Cut(GrammarError::unexpected(
                "repeat or pause",
                Some(&key_token),
            )));
        }
    }

    Ok(custom)
}

fn schedule<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, ScheduleCommand>
where
    'src: 'slice,
{
    if peek_ident(input).is_some_and(|word| word.eq_ignore_ascii_case("cancel")) {
        advance(input);
        return Ok(ScheduleCommand::Cancel);
    }

    Ok(ScheduleCommand::After {
        delay: duration(input)?,
        pattern: pattern(input)?,
    })
}

fn pattern<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, AlertPattern>
where
    'src: 'slice,
{
    let token = expect_kind(TokenKind::Ident, "pattern name").parse_next(input)?;
    AlertPattern::from_name(token.lexeme).ok_or_else(|| {
        ErrMode::Cut(GrammarError::unexpected("pattern name", Some(&token)))
    })
}

fn choice<'src, 'slice, T: Copy>(
    input: &mut Input<'src, 'slice>,
    label: &'static str,
    table: &'static [(&'static str, T)],
) -> ParseResult<'src, T>
where
    'src: 'slice,
{
    let token = expect_kind(TokenKind::Ident, label).parse_next(input)?;
    table
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(token.lexeme))
        .map(|(_, value)| *value)
        .ok_or_else(|| ErrMode::Backtrack(GrammarError::unexpected(label, Some(&token))))
}

fn magnitude<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, f32>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest))
            if matches!(
                token.kind,
                TokenKind::Magnitude | TokenKind::Decimal | TokenKind::Integer
            ) =>
        {
            *input = rest;
            parse_magnitude(token).map_err(ErrMode::Cut)
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "magnitude",
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "magnitude",
            None,
        ))),
    }
}

fn duration<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, Duration>
where
    'src: 'slice,
{
    let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
    parse_duration(&token).map_err(ErrMode::Cut)
}

fn integer<'src, 'slice>(input: &mut Input<'src, 'slice>) -> ParseResult<'src, u8>
where
    'src: 'slice,
{
    let token = expect_kind(TokenKind::Integer, "integer").parse_next(input)?;
    parse_integer(&token).map_err(ErrMode::Cut)
}

fn peek_ident<'src>(input: &Input<'src, '_>) -> Option<&'src str> {
    input
        .first()
        .filter(|token| token.kind == TokenKind::Ident)
        .map(|token| token.lexeme)
}

fn advance(input: &mut Input<'_, '_>) {
    if let Some((_, rest)) = input.split_first() {
        *input = rest;
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<u8, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u8>()
        .map_err(|_| GrammarError::invalid_number(token))
}

fn parse_magnitude<'a>(token: &Token<'a>) -> Result<f32, GrammarError<'a>> {
    let text = token.lexeme.strip_suffix('g').unwrap_or(token.lexeme);
    text.parse::<f32>()
        .map_err(|_| GrammarError::invalid_number(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn parses_samples_with_and_without_unit() {
        assert_eq!(parse_ok("sample 0.2g"), Command::Sample(0.2));
        assert_eq!(parse_ok("sample 3"), Command::Sample(3.0));
        assert_eq!(parse_ok("sample 1.25"), Command::Sample(1.25));
    }

    #[test]
    fn parses_beep_forms() {
        assert_eq!(
            parse_ok("beep"),
            Command::Beep(BeepCommand::Pattern(AlertPattern::Single))
        );
        assert_eq!(
            parse_ok("beep sos"),
            Command::Beep(BeepCommand::Pattern(AlertPattern::Sos))
        );
        assert_eq!(parse_ok("beep 500ms"), Command::Beep(BeepCommand::For(ms(500))));
        assert_eq!(
            parse_ok("beep custom"),
            Command::Beep(BeepCommand::Pattern(AlertPattern::Custom))
        );
    }

    #[test]
    fn parses_custom_beep_assignments() {
        assert_eq!(
            parse_ok("beep custom 100ms 50ms repeat=3 pause=1s"),
            Command::Beep(BeepCommand::Custom(CustomBeep {
                on: ms(100),
                off: ms(50),
                repeat: Some(3),
                pause: Some(Duration::from_secs(1)),
            }))
        );
        assert!(parse("beep custom 100ms 50ms volume=3").is_err());
    }

    #[test]
    fn parses_schedule_variants() {
        assert_eq!(
            parse_ok("schedule 2s warning"),
            Command::Schedule(ScheduleCommand::After {
                delay: Duration::from_secs(2),
                pattern: AlertPattern::Warning,
            })
        );
        assert_eq!(
            parse_ok("schedule cancel"),
            Command::Schedule(ScheduleCommand::Cancel)
        );
    }

    #[test]
    fn parses_configuration_commands() {
        assert_eq!(
            parse_ok("thresholds 0.4g 3g"),
            Command::Thresholds {
                low_g: 0.4,
                high_g: 3.0,
            }
        );
        assert_eq!(
            parse_ok("timing 250ms 2s"),
            Command::Timing {
                window: ms(250),
                cooldown: Duration::from_secs(2),
            }
        );
        assert_eq!(parse_ok("smoothing 4"), Command::Smoothing(4));
        assert_eq!(parse_ok("emergency-mode off"), Command::EmergencyMode(false));
    }

    #[test]
    fn parses_maintenance_commands() {
        assert_eq!(parse_ok("fall selftest"), Command::Fall(FallCommand::SelfTest));
        assert_eq!(parse_ok("stop"), Command::Stop { all: false });
        assert_eq!(parse_ok("stop all"), Command::Stop { all: true });
        assert_eq!(parse_ok("alert sos"), Command::Alert(AlertPattern::Sos));
        assert_eq!(parse_ok("wait 1s\r\n"), Command::Wait(Duration::from_secs(1)));
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help beep"),
            Command::Help(HelpCommand { topic: Some("beep") })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn supports_case_insensitive_keywords() {
        assert_eq!(
            parse_ok("BeEp WaRnInG"),
            Command::Beep(BeepCommand::Pattern(AlertPattern::Warning))
        );
    }

    #[test]
    fn rejects_unknown_alert_and_trailing_input() {
        assert!(matches!(
            parse("alert single"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken { .. }
            }))
        ));
        assert!(matches!(
            parse("status now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                }
            }))
        ));
        assert!(matches!(
            parse("timing 250ms"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedEnd { .. }
            }))
        ));
    }

    #[test]
    fn rejects_out_of_range_integer() {
        match parse("smoothing 300") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidNumber { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("beep sos$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_classifies_literals() {
        let tokens = lex("sample 0.2g 150ms 1.5 7 x=").expect("lexing should succeed");
        let kinds: HeaplessVec<TokenKind, 8> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds.as_slice(),
            &[
                TokenKind::Ident,
                TokenKind::Magnitude,
                TokenKind::Duration,
                TokenKind::Decimal,
                TokenKind::Integer,
                TokenKind::Ident,
                TokenKind::Equals,
            ]
        );
    }
}
