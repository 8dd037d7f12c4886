#![no_std]
#![no_main]

use core::fmt::Write;

use defmt::*;

use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_rp::adc::{self, Adc, Channel};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::spi::{Config as SpiConfig, Phase, Polarity, Spi};
use embassy_rp::uart::{Config as UartConfig, UartTx};
use embassy_time::{Delay, Instant, Timer};
use embedded_hal::digital::PinState;
use embedded_hal_bus::spi::ExclusiveDevice;

use display_interface_spi::SPIInterface;

use {defmt_rtt as _, panic_probe as _};

use rims_rs::controller::{Controller, ControllerConfig, TickInputs};
use rims_rs::controls::RelayPolarity;
use rims_rs::display;
use rims_rs::pid::{Pid, PidConfig};
use rims_rs::sensor::{SensorConfig, SensorError};
use rims_rs::sh1107::SH1107;

bind_interrupts!(struct Irqs {
    ADC_IRQ_FIFO => adc::InterruptHandler;
});

const REPORT_LINE: usize = 128;

fn now_ms() -> u32 {
    // Truncation is intended: every interval in the loop uses wrapping math
    Instant::now().as_millis() as u32
}

fn level(pin: &Input<'_>) -> PinState {
    PinState::from(pin.is_high())
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Program start");
    let peripherals = embassy_rp::init(Default::default());
    let mut delay = Delay;

    // Display pins
    let dc = Output::new(peripherals.PIN_8, Level::Low);     // Data/Command
    let cs = Output::new(peripherals.PIN_9, Level::High);    // Chip Select
    let sclk = peripherals.PIN_10;                               // Serial Clock
    let mosi = peripherals.PIN_11;                               // Master Out Slave In
    let rst = Output::new(peripherals.PIN_12, Level::Low);   // Reset

    // Heater relay, setpoint buttons (active-low), thermistor divider on ADC2
    let relay = Output::new(peripherals.PIN_5, Level::Low);
    let inc_button = Input::new(peripherals.PIN_6, Pull::Up);
    let dec_button = Input::new(peripherals.PIN_7, Pull::Up);
    let mut adc = Adc::new(peripherals.ADC, Irqs, adc::Config::default());
    let mut thermistor = Channel::new_pin(peripherals.PIN_28, Pull::None);

    // Status report
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 9600;
    let mut serial = UartTx::new_blocking(peripherals.UART0, peripherals.PIN_0, uart_config);

    let mut spi_config = SpiConfig::default();
    spi_config.frequency = 2_000_000;
    spi_config.phase = Phase::CaptureOnSecondTransition;
    spi_config.polarity = Polarity::IdleHigh;

    let spi = Spi::new_txonly(peripherals.SPI1, sclk, mosi, peripherals.DMA_CH0, spi_config);
    let spi_device = unwrap!(ExclusiveDevice::new(spi, cs, Delay));
    let mut screen = SH1107::new(SPIInterface::new(spi_device, dc), rst);

    if let Err(e) = screen.init(&mut delay).await {
        warn!("Display init failed: {:?}", Debug2Format(&e));
    }
    if let Err(e) = display::draw_splash(&mut screen, "     RIMS rs", "     v0.1.0") {
        warn!("Splash draw failed: {:?}", Debug2Format(&e));
    }
    if let Err(e) = screen.flush().await {
        warn!("Display flush failed: {:?}", Debug2Format(&e));
    }
    Timer::after_secs(2).await;

    // RP2040: 12-bit ADC against the 3.3 V rail
    let config = ControllerConfig {
        sensor: SensorConfig {
            vref_mv: 3300.0,
            adc_resolution: 4095,
            ..Default::default()
        },
        relay_polarity: RelayPolarity::ActiveHigh,
        ..Default::default()
    };
    let pid = unwrap!(Pid::new(PidConfig::default()));
    let mut controller = unwrap!(Controller::new(config, pid, relay, now_ms()));
    info!("Controller running, setpoint {}°C", controller.setpoint());

    loop {
        let sample = adc
            .read(&mut thermistor)
            .await
            .map_err(|_| SensorError::ConversionError);

        let tick = controller.tick(TickInputs {
            now_ms: now_ms(),
            sample,
            increment: level(&inc_button),
            decrement: level(&dec_button),
        });

        if let Err(e) = display::draw_status(&mut screen, &tick.status) {
            warn!("Status draw failed: {:?}", Debug2Format(&e));
        }
        if let Err(e) = screen.flush().await {
            warn!("Display flush failed: {:?}", Debug2Format(&e));
        }

        if tick.report_due {
            let mut line: heapless::String<REPORT_LINE> = heapless::String::new();
            if core::write!(line, "{}\r\n", tick.status).is_ok() {
                let _ = serial.blocking_write(line.as_bytes());
            }
            info!(
                "{} heater={} faults={}",
                tick.status,
                tick.heater_on,
                controller.sensor_faults()
            );
        }

        yield_now().await;
    }
}
