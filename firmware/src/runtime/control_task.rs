use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};

use crate::control::ControlLoop;
use crate::hw::GpioBuzzer;
use crate::sampling::{self, SampleReceiver, TICK_PERIOD_MS};

/// Wakes on the alert tick or an incoming sample, whichever comes first.
#[embassy_executor::task]
pub async fn run(
    mut control: ControlLoop<'static, GpioBuzzer<'static>>,
    samples: SampleReceiver<'static>,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    loop {
        match select(ticker.next(), samples.receive()).await {
            Either::First(()) => control.on_tick(sampling::now()),
            Either::Second(sample) => control.on_sample(sample),
        }
    }
}
