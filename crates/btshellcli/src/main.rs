use btshell::demo::{BeaconConfig, BeaconUuid};
use btshell::stack::EventSender;
use btshell::{
    BluetoothStack, Console, Demo, DemoConfig, EventQueue, HciStack, HeadsetDemo, HogpDemo,
    IbeaconDemo, IoCapability, LoopbackStack, PairingCapabilities, Runner,
};
use clap::{Parser, ValueEnum};
use log::{error, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::thread;

#[derive(Parser, Debug)]
#[command(about = "Console demos for a Bluetooth stack")]
struct Args {
    /// Demo application to run
    #[arg(long, value_enum, default_value_t = DemoKind::Hogp)]
    demo: DemoKind,

    /// Stack the demo drives
    #[arg(long, value_enum, default_value_t = Backend::Loopback)]
    backend: Backend,

    /// HCI device index for the hci backend
    #[arg(long, default_value_t = 0)]
    hci_device: u16,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Initial I/O capability (0 = Display Only .. 4 = Keyboard/Display)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=4))]
    io_capability: u8,

    /// Require MITM protection when pairing
    #[arg(long)]
    mitm: bool,

    /// Local name placed in advertising data
    #[arg(long, default_value = "btshell")]
    device_name: String,

    /// Initial iBeacon proximity UUID
    #[arg(long)]
    beacon_uuid: Option<BeaconUuid>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DemoKind {
    Hogp,
    Headset,
    Ibeacon,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    /// In-process stack without a controller
    Loopback,
    /// Raw HCI socket on a Linux controller
    Hci,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Args {
    fn config(&self) -> DemoConfig {
        let mut capabilities = PairingCapabilities::default();
        if let Some(io_capability) = IoCapability::from_u8(self.io_capability) {
            capabilities.io_capability = io_capability;
        }
        capabilities.mitm = self.mitm;

        let mut beacon = BeaconConfig::default();
        if let Some(uuid) = self.beacon_uuid {
            beacon.uuid = uuid;
        }

        DemoConfig {
            device_name: self.device_name.clone(),
            capabilities,
            beacon,
        }
    }
}

/// Forward console lines to the runner, then signal the end of input
fn spawn_console_reader(events: EventSender) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if !events.line(line) {
                        return;
                    }
                }
                Err(e) => {
                    error!("Console read failed: {}", e);
                    break;
                }
            }
        }
        events.shutdown();
    });
}

fn run<S: BluetoothStack, D: Demo>(stack: S, config: DemoConfig, queue: EventQueue) -> ExitCode {
    let mut runner = match Runner::<S, D>::new(stack, Console::stdout(), config, queue) {
        Ok(runner) => runner,
        Err(e) => {
            error!("Unable to build the {} command tables: {}", D::NAME, e);
            return ExitCode::FAILURE;
        }
    };

    match runner.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} demo failed: {} ({})", D::NAME, e, e.code());
            ExitCode::FAILURE
        }
    }
}

fn run_demo<S: BluetoothStack>(kind: DemoKind, stack: S, config: DemoConfig, queue: EventQueue) -> ExitCode {
    match kind {
        DemoKind::Hogp => run::<S, HogpDemo>(stack, config, queue),
        DemoKind::Headset => run::<S, HeadsetDemo>(stack, config, queue),
        DemoKind::Ibeacon => run::<S, IbeaconDemo>(stack, config, queue),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = TermLogger::init(
        args.log_level.into(),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Unable to start logging: {}", e);
    }

    let config = args.config();
    let (queue, events) = EventQueue::new();
    spawn_console_reader(events.clone());

    info!("{:?} demo on the {:?} backend", args.demo, args.backend);
    match args.backend {
        Backend::Loopback => {
            let stack = LoopbackStack::with_random_address().with_events(events);
            run_demo(args.demo, stack, config, queue)
        }
        Backend::Hci => {
            let stack = HciStack::new(args.hci_device, events);
            run_demo(args.demo, stack, config, queue)
        }
    }
}
