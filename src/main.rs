mod config;
mod coordinator;
mod counter;
mod display;
mod gate;
mod indicator;
mod input;
mod shutdown;
mod system;
mod worker;

use log::{debug, info};
use tokio::{select, signal, sync::mpsc::Receiver};

use crate::{
    config::Config,
    display::{counter_row, spawn_renderer, terminal::TerminalDisplay, DisplayHandle},
    input::Command,
    system::{Phase, RunReport, System, SystemError},
};

enum Event {
    Finished(Result<RunReport, SystemError>),
    Input(Option<Command>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    log_panics::init();

    let config = Config::from_args(std::env::args().skip(1))?;
    config.validate()?;
    info!(
        "Starting simulation with {} tasks, threshold {}",
        config.tasks, config.threshold
    );

    let (display, renderer) = spawn_renderer(TerminalDisplay::stdout());
    let commands = input::spawn_reader(tokio::io::stdin());

    let hint_row = counter_row(config.tasks).saturating_add(2);
    let mut system = System::new(config, display.clone());
    let result = run(&mut system, commands, &display, hint_row).await;

    // the renderer finishes once every handle is gone
    drop(system);
    drop(display);
    renderer.await?;
    println!();

    result
}

async fn run(
    system: &mut System,
    mut commands: Receiver<Command>,
    display: &DisplayHandle,
    hint_row: u16,
) -> anyhow::Result<()> {
    system.start()?;
    let mut input_open = true;

    loop {
        let running = system.phase() == Phase::Running;
        if !running && !input_open {
            debug!("run is over and there is no more input");
            break;
        }

        let event = select! {
            report = system.wait(), if running => Event::Finished(report),
            command = commands.recv(), if input_open => Event::Input(command),
            _ = signal::ctrl_c() => Event::Input(Some(Command::Quit)),
        };

        match event {
            Event::Finished(report) => {
                let report = report?;
                display.render_at(
                    hint_row,
                    0,
                    format!(
                        "Finished at {} ({} lost updates). Space to restart, 'q' to quit.",
                        report.final_value, report.lost_updates
                    ),
                );
                display.refresh();
            }
            Event::Input(Some(Command::Restart)) => {
                if let Some(snapshot) = system.snapshot().await {
                    info!(
                        "restarting simulation, run {} was at {}",
                        snapshot.generation, snapshot.counter
                    );
                }
                system.restart().await?;
            }
            Event::Input(Some(Command::Quit)) => break,
            Event::Input(None) => {
                debug!("no more input, keep running until the run ends");
                input_open = false;
            }
        }
    }

    if let Some(report) = system.shutdown().await? {
        info!(
            "stopped run {} at {}",
            report.generation, report.final_value
        );
    }

    Ok(())
}
