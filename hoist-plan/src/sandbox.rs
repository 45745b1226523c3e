//! Lua sandbox creation
//!
//! Plans are evaluated with only the table, string and math libraries. No
//! I/O, no `os`, and no way to load further code, so evaluating a plan can
//! never touch the machine it runs on.

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib, Table};

use hoist_core::domain::plan::PLAN_VERSION;

/// Create the restricted sandbox used to evaluate plan files
///
/// A `plan` global is always registered:
/// - `plan.define(t)` returns `t` unchanged
/// - `plan.version` is the current plan format version
///
/// # Example
/// ```
/// use hoist_plan::sandbox::create_plan_sandbox;
///
/// let lua = create_plan_sandbox()?;
/// let version: u32 = lua.load("return plan.version").eval()?;
/// assert_eq!(version, 1);
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_plan_sandbox() -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH,
        LuaOptions::default(),
    )?;

    // The base library is always present; strip its loaders
    let globals = lua.globals();
    for name in ["require", "dofile", "loadfile", "load", "collectgarbage"] {
        globals.set(name, mlua::Nil)?;
    }

    register_plan_module(&lua)?;

    Ok(lua)
}

fn register_plan_module(lua: &Lua) -> LuaResult<()> {
    let plan = lua.create_table()?;

    let define_fn = lua.create_function(|_, definition: Table| Ok(definition))?;
    plan.set("define", define_fn)?;
    plan.set("version", PLAN_VERSION)?;

    lua.globals().set("plan", plan)?;

    Ok(())
}
