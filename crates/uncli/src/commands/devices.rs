//! `list`, `block`, `unblock` and `kick`.

use uncli_core::{Action, Console, apply, plan};

use super::{connect, device_format, load_settings, summarize};
use crate::cli::{GlobalOpts, MatchArgs};
use crate::error::CliError;

pub async fn handle(action: Action, args: MatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = load_settings(global)?;
    let mut session = connect(&settings).await?;

    let operations = plan(action, args.terms);
    let mut console = Console::stdio(device_format(global.output));
    let report = apply(&mut session, &operations, &mut console).await?;

    if action != Action::Display {
        summarize(&report);
    }
    Ok(())
}
