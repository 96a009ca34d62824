use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Level, Output, Speed};
use safety_core::fall::FallDetectorConfig;

use crate::control::ControlLoop;
use crate::hw::{AnalogAccelerometer, GpioBuzzer};
use crate::sampling::{AxisCalibration, SampleQueue, SampleSender};
use crate::status::StatusCache;

mod control_task;
mod heartbeat_task;
mod sensor_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static SAMPLES: SampleQueue = SampleQueue::new();
pub(super) static STATUS: StatusCache = StatusCache::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        ADC1,
        PA0,
        PA1,
        PA6,
        PB8,
        ..
    } = hal::init(config);

    let buzzer = GpioBuzzer::new(Output::new(PB8, Level::Low, Speed::Low));
    let accelerometer = AnalogAccelerometer::new(
        Adc::new(ADC1),
        [PA0.degrade_adc(), PA1.degrade_adc(), PA6.degrade_adc()],
        AxisCalibration::DEFAULT,
    );

    let control = ControlLoop::new(FallDetectorConfig::DEFAULT, buzzer, &STATUS);
    if !control.self_test().passed() {
        defmt::error!("detector self-test failed; continuing with defaults");
    }

    spawner
        .spawn(control_task::run(control, SAMPLES.receiver()))
        .expect("failed to spawn control task");
    spawner
        .spawn(sensor_task::run(
            accelerometer,
            SampleSender::new(SAMPLES.sender()),
        ))
        .expect("failed to spawn sensor task");
    spawner
        .spawn(heartbeat_task::run(&STATUS))
        .expect("failed to spawn heartbeat task");

    core::future::pending::<()>().await;
}
