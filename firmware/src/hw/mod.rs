//! Board peripherals: the alert transducer and the analog accelerometer.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::ADC1;
use safety_core::alert::AlertOutput;

use crate::sampling::{AxisCalibration, magnitude_from_counts};

/// Self-oscillating piezo buzzer switched by a push-pull pin.
///
/// Pitch and loudness are fixed by the part, so only `set_active` is wired.
pub struct GpioBuzzer<'d> {
    pin: Output<'d>,
}

impl<'d> GpioBuzzer<'d> {
    pub fn new(mut pin: Output<'d>) -> Self {
        pin.set_low();
        Self { pin }
    }
}

impl AlertOutput for GpioBuzzer<'_> {
    fn set_active(&mut self, active: bool) {
        if active {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Three-axis ratiometric accelerometer on ADC1.
pub struct AnalogAccelerometer<'d> {
    adc: Adc<'d, ADC1>,
    axes: [AnyAdcChannel<ADC1>; 3],
    calibration: AxisCalibration,
}

impl<'d> AnalogAccelerometer<'d> {
    pub fn new(
        mut adc: Adc<'d, ADC1>,
        axes: [AnyAdcChannel<ADC1>; 3],
        calibration: AxisCalibration,
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES39_5);
        Self {
            adc,
            axes,
            calibration,
        }
    }

    /// Reads all three axes back to back and returns the vector magnitude in g.
    pub fn read_magnitude(&mut self) -> f32 {
        let mut counts = [0_u16; 3];
        for (slot, axis) in counts.iter_mut().zip(self.axes.iter_mut()) {
            *slot = self.adc.blocking_read(axis);
        }
        magnitude_from_counts(counts, self.calibration)
    }
}
