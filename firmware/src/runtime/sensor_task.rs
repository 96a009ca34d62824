use embassy_time::{Duration, Ticker};

use super::STATUS;
use crate::hw::AnalogAccelerometer;
use crate::sampling::{self, SAMPLE_PERIOD_MS, SampleSender};

#[embassy_executor::task]
pub async fn run(
    mut accelerometer: AnalogAccelerometer<'static>,
    mut sender: SampleSender<'static>,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS));
    loop {
        ticker.next().await;
        let magnitude = accelerometer.read_magnitude();
        if !sender.offer(magnitude, sampling::now()) {
            STATUS.record_dropped_samples(sender.dropped());
        }
    }
}
