use std::process::ExitCode;

use clap::Parser;

use annex_provisioner::common::cli::ProvisionerOpts;
use annex_provisioner::common::setup::setup_logging;
use annex_provisioner::common::timeutils::now_wallclock;
use annex_provisioner::provisioner::{PROVISIONER_FAILURE, Provisioner};

async fn run_provisioner(opts: ProvisionerOpts) -> annex_provisioner::Result<u8> {
    let request = opts.resource_request(now_wallclock())?;
    let mut provisioner = Provisioner::new(
        &opts.identity_resolver(),
        request,
        opts.state,
        opts.provisioner_config(),
        Box::new(opts.fleet_handler()),
        Box::new(opts.state_sink()),
    )?;
    let state = provisioner.run().await;
    Ok(state.exit_code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opts = ProvisionerOpts::parse();
    setup_logging(opts.debug);

    match run_provisioner(opts).await {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            log::error!("{error}");
            ExitCode::from(PROVISIONER_FAILURE)
        }
    }
}
