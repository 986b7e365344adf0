// sv_ccmds.rs — savegame console commands
//
// Commands take the game plus the tokenized command line. They report to the
// console and never fail outward: a failed save or load is a message.

use std::path::Path;

use vsave_common::common::{com_dprintf, com_printf, DISTNAME, DISTVER};
use vsave_common::cvar::cvar_save_config;
use vsave_common::error::SaveError;

use crate::game::{Game, QUICKSAVE_SLOT};
use crate::slot::list_slots;

/// Longest accepted slot name.
pub const MAX_SLOT_NAME: usize = 32;

/// Slot names become file names: letters, digits and underscores only.
pub fn valid_slot_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_SLOT_NAME
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A single player must be alive to save.
fn can_save(game: &Game) -> bool {
    let alive = game.players.len() > 1 || game.player_health(0).map_or(true, |h| h > 0);
    if !alive {
        com_printf("\nCan't savegame while dead!\n");
    }
    alive
}

fn report_load_failure(e: &SaveError) {
    if e.is_corruption() {
        com_printf(&format!("load failed: savegame is damaged ({})\n", e));
    } else {
        com_printf(&format!("load failed: {}\n", e));
    }
}

/// `save <slot> [description]`
pub fn sv_savegame_f(game: &mut Game, cmd_argc: usize, cmd_argv: &dyn Fn(usize) -> String) {
    if !(2..=3).contains(&cmd_argc) {
        com_printf("USAGE: save <slot> [description]\n");
        return;
    }

    let slot = cmd_argv(1);
    if !valid_slot_name(&slot) {
        com_printf("Bad savegame name.\n");
        return;
    }
    if slot == QUICKSAVE_SLOT {
        com_printf(&format!("Can't save to '{}'\n", QUICKSAVE_SLOT));
        return;
    }
    if !can_save(game) {
        return;
    }

    let description = if cmd_argc == 3 {
        cmd_argv(2)
    } else {
        game.level.map_name().to_string()
    };

    com_printf("Saving game...\n");
    match game.save_game(&slot, &description) {
        Ok(()) => com_printf("Done.\n"),
        Err(e) => com_printf(&format!("save failed: {}\n", e)),
    }
}

/// `load <slot>`
pub fn sv_loadgame_f(game: &mut Game, cmd_argc: usize, cmd_argv: &dyn Fn(usize) -> String) {
    if cmd_argc != 2 {
        com_printf("USAGE: load <slot>\n");
        return;
    }

    let slot = cmd_argv(1);
    if !valid_slot_name(&slot) {
        com_printf("Bad savegame name.\n");
        return;
    }

    com_printf("Loading game...\n");
    if let Err(e) = game.load_game(&slot) {
        report_load_failure(&e);
    }
}

/// `quicksave`
pub fn sv_quicksave_f(game: &mut Game, _cmd_argc: usize, _cmd_argv: &dyn Fn(usize) -> String) {
    if !can_save(game) {
        return;
    }
    match game.quicksave() {
        Ok(()) => com_printf("Game saved.\n"),
        Err(e) => com_printf(&format!("save failed: {}\n", e)),
    }
}

/// `quickload`
pub fn sv_quickload_f(game: &mut Game, _cmd_argc: usize, _cmd_argv: &dyn Fn(usize) -> String) {
    if let Err(e) = game.quickload() {
        report_load_failure(&e);
    }
}

/// `savelist`
pub fn sv_savelist_f(game: &mut Game, _cmd_argc: usize, _cmd_argv: &dyn Fn(usize) -> String) {
    let dir = Path::new(&game.config.save_dir);
    com_dprintf(&format!("savelist {}\n", dir.display()));
    let slots = list_slots(dir);
    if slots.is_empty() {
        com_printf("No savegames.\n");
        return;
    }
    com_printf(&format!("{} {:.2} savegames:\n", DISTNAME, DISTVER));
    for (name, info) in &slots {
        com_printf(&format!(
            "{:<16} {:<24} {:<8} {}{}\n",
            name,
            info.description,
            info.current_map,
            info.time_string(),
            if info.has_checkpoint && info.map_count == 0 { " (checkpoint)" } else { "" }
        ));
    }
}

/// Dispatch a tokenized console line. Returns false for commands that are
/// not savegame commands. The save cvars are re-read first when the cvar
/// system is running.
pub fn sv_execute_save_command(game: &mut Game, cmd_argc: usize, cmd_argv: &dyn Fn(usize) -> String) -> bool {
    if cmd_argc == 0 {
        return false;
    }
    let command: fn(&mut Game, usize, &dyn Fn(usize) -> String) = match cmd_argv(0).as_str() {
        "save" => sv_savegame_f,
        "load" => sv_loadgame_f,
        "quicksave" => sv_quicksave_f,
        "quickload" => sv_quickload_f,
        "savelist" => sv_savelist_f,
        _ => return false,
    };
    if let Some(config) = cvar_save_config() {
        game.config = config;
    }
    command(game, cmd_argc, cmd_argv);
    true
}
