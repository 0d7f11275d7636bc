//! Show command - print the resolved desired state

use super::{RunContext, StateArgs, load_state};
use crate::display;
use crate::error::Result;

pub fn run(args: &StateArgs, ctx: &mut RunContext) -> Result<()> {
    let loaded = load_state(args, ctx)?;
    display::print_state(&loaded.state, &loaded.source);
    Ok(())
}
