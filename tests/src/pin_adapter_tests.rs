//! embedded-hal pin adapters against mocked pins

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use drive_core::{Channel, HalError, KeypadMatrix, MatrixPins, PwmOutput, PwmStage};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use embedded_hal_mock::eh1::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

fn pins(expectations: [&[PinTransaction]; 4]) -> [PinMock; 4] {
    expectations.map(PinMock::new)
}

#[test]
fn test_matrix_drives_one_column_low() {
    let high = [PinTransaction::set(PinState::High)];
    let low = [PinTransaction::set(PinState::Low)];
    let columns = pins([&high, &high, &low, &high]);
    let rows = pins([&[], &[], &[], &[]]);

    let mut matrix = MatrixPins::new(columns, rows);
    matrix.drive_column(2).unwrap();
    assert_eq!(matrix.drive_column(4), Err(HalError::InvalidConfig));

    let (mut columns, mut rows) = matrix.free();
    columns.iter_mut().chain(rows.iter_mut()).for_each(|pin| pin.done());
}

#[test]
fn test_matrix_reads_low_rows_as_held() {
    let read_high = [PinTransaction::get(PinState::High)];
    let read_low = [PinTransaction::get(PinState::Low)];
    let columns = pins([&[], &[], &[], &[]]);
    let rows = pins([&read_high, &read_low, &read_high, &read_low]);

    let mut matrix = MatrixPins::new(columns, rows);
    assert_eq!(matrix.read_rows().unwrap(), 0b1010);

    let (mut columns, mut rows) = matrix.free();
    columns.iter_mut().chain(rows.iter_mut()).for_each(|pin| pin.done());
}

/// PWM channel recording its compare value
struct FakeChannel {
    max: u16,
    duty: Rc<Cell<u16>>,
}

impl ErrorType for FakeChannel {
    type Error = Infallible;
}

impl SetDutyCycle for FakeChannel {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.set(duty);
        Ok(())
    }
}

fn channel(max: u16) -> (FakeChannel, Rc<Cell<u16>>) {
    let duty = Rc::new(Cell::new(0));
    (FakeChannel { max, duty: duty.clone() }, duty)
}

#[test]
fn test_pwm_stage_scales_percent_and_gates_output() {
    let (h_bridge, h_duty) = channel(1000);
    let (boost, boost_duty) = channel(1000);
    let (buck, buck_duty) = channel(4000);
    let enable = PinMock::new(&[PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)]);
    let mut enable_check = enable.clone();

    let mut stage = PwmStage::new(h_bridge, boost, buck, enable);
    stage.set_duty(Channel::HBridge, 50.0).unwrap();
    stage.set_duty(Channel::Boost, 150.0).unwrap();
    stage.set_duty(Channel::Buck, 25.0).unwrap();
    stage.set_output_enabled(true).unwrap();
    stage.set_output_enabled(false).unwrap();

    assert_eq!(h_duty.get(), 500);
    // Out-of-range requests clamp to the channel's full scale
    assert_eq!(boost_duty.get(), 1000);
    assert_eq!(buck_duty.get(), 1000);

    stage.set_duty(Channel::Boost, -5.0).unwrap();
    assert_eq!(boost_duty.get(), 0);
    enable_check.done();
}
