use anyhow::Context;
use pipeline_console::render;
use pipeline_console::{ConsoleAction, ConsoleApp};
use pipeline_monitor::{init_logging, ControllerError, EnvConfig, PipelineRuntime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EnvConfig::from_env();
    init_logging(&config).context("failed to initialize logging")?;

    let mut runtime = PipelineRuntime::new(&config).context("failed to build runtime")?;
    let mut snapshots = runtime.subscribe();
    let mut app = ConsoleApp::new();
    runtime.connect();
    info!(endpoint = runtime.endpoint(), "console started");
    println!("{}", render::banner(runtime.endpoint()));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let action = app.on_input(&line);
                if !handle_action(&mut runtime, &mut app, action).await {
                    break;
                }
            }
            event = runtime.next_event() => {
                let Some(event) = event else {
                    warn!("stream channel closed");
                    break;
                };
                runtime.apply(event);
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        if snapshots.has_changed().unwrap_or(false) {
            let _ = snapshots.borrow_and_update();
            for line in app.drain_updates(runtime.controller()) {
                println!("{line}");
            }
        }
    }

    runtime.shutdown().await;
    info!("console stopped");
    Ok(())
}

/// Runs one input action. Returns false when the console should exit.
async fn handle_action(
    runtime: &mut PipelineRuntime,
    app: &mut ConsoleApp,
    action: ConsoleAction,
) -> bool {
    match action {
        ConsoleAction::Nothing => {}
        ConsoleAction::Print(text) => println!("{text}"),
        ConsoleAction::Send(message) => match runtime.submit(&message) {
            Ok(_) => app.on_submitted(),
            Err(ControllerError::NotConnected) => {
                println!("Not connected; the message was not sent. Retrying the connection…");
            }
            Err(error) => println!("{error}"),
        },
        ConsoleAction::Reset => {
            runtime.reset().await;
            app.on_reset();
            println!("Conversation cleared.");
        }
        ConsoleAction::Scenarios => match runtime.api().scenarios().await {
            Ok(scenarios) => {
                println!("{}", render::scenarios(&scenarios));
                app.set_scenarios(scenarios);
            }
            Err(error) => println!("Could not load scenarios: {error}"),
        },
        ConsoleAction::Health => match runtime.api().health().await {
            Ok(health) => println!("{}", render::health(&health)),
            Err(error) => println!("Backend unreachable: {error}"),
        },
        ConsoleAction::Status => {
            let snapshot = runtime.controller().snapshot();
            println!("{}", render::status(&snapshot, runtime.endpoint()));
        }
        ConsoleAction::Log => {
            println!("{}", render::activity(runtime.controller().aggregator().events()));
        }
        ConsoleAction::Quit => return false,
    }
    true
}
