use panel::daemon::run;
use panel::error::PanelError;

use common::ErrorLocation;

use std::panic::Location;
use std::process::ExitCode;

/// The dispatcher is single-task, so a current-thread runtime is enough.
fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let error = PanelError::Panel {
                message: format!("Failed to build runtime: {e}"),
                location: ErrorLocation::from(Location::caller()),
            };
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
