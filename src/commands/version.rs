use clap::Args;
use serde::Serialize;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct VersionArgs {
    /// Also ask the gatecheck binary for its version
    #[arg(long)]
    tools: bool,
}

#[derive(Serialize)]
pub struct VersionOutput {
    pub command: String,
    pub version: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gatecheck: Option<String>,
}

pub fn run(args: VersionArgs, _global: &GlobalArgs) -> CmdResult<VersionOutput> {
    let gatecheck = if args.tools {
        Some(gatecheck_version()?)
    } else {
        None
    };

    Ok((
        VersionOutput {
            command: "version.show".to_string(),
            version: crate::VERSION.to_string(),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            gatecheck,
        },
        0,
    ))
}

fn gatecheck_version() -> portage::Result<String> {
    use portage::context::Context;
    use portage::exec::{Output, SharedBuffer};

    let captured = SharedBuffer::new();
    let ctx = Context::local();
    let opts = ctx
        .quiet_options()
        .with_stdout(Output::Capture(captured.clone()));
    ctx.run(&portage::tools::gatecheck_version(), opts)?;
    Ok(captured.to_string_lossy().trim().to_string())
}
