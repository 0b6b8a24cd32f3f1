use arch_provision::{
    cli::{Cli, Settings},
    logging,
    prompt::TermPrompter,
    stage, ui,
};
use tracing::error;

fn main() {
    let settings = Settings::from(Cli::parse_args());

    if let Err(e) = logging::init(&settings.log_file, settings.debug) {
        ui::print_error(&e.to_string());
        std::process::exit(e.exit_code());
    }

    if let Err(e) = stage::run(&settings, &mut TermPrompter) {
        println!();
        ui::print_error(&e.to_string());
        error!(target: "stage", "Fatal: {}", e);
        std::process::exit(e.exit_code());
    }
}
