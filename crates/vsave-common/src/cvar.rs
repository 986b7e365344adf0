// cvar.rs — console variables for the save subsystem
// Trimmed from the engine's cvar system to what save/load needs.

use std::collections::HashMap;

use parking_lot::Mutex;

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub value: f32,
}

/// The full cvar system context.
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
        }
    }

    /// Find a cvar by name.
    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. An existing cvar keeps its value.
    pub fn get(&mut self, name: &str, value: &str) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            value: value.parse::<f32>().unwrap_or(0.0),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a cvar value, creating the cvar if needed.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value),
        };

        let var = &mut self.cvar_vars[idx];
        if value != var.string {
            var.string = value.to_string();
            var.value = value.parse::<f32>().unwrap_or(0.0);
        }
        idx
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Save subsystem cvars
// ============================================================

/// Register the save subsystem's cvars with their defaults.
pub fn save_register_cvars(ctx: &mut CvarContext) {
    ctx.get("developer", "0");
    ctx.get("save_compression_level", "6");
    ctx.get("save_intern_strings", "1");
    ctx.get("save_verbose", "0");
    ctx.get("save_dir", "save");
    ctx.get("save_checkpoints", "0");
}

/// Snapshot of the save cvars, passed explicitly into save/load operations.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveConfig {
    /// 0 disables entry compression, 1..=9 selects the deflate level.
    pub compression_level: u32,
    pub intern_strings: bool,
    pub save_dir: String,
    pub checkpoints: bool,
}

impl SaveConfig {
    pub fn from_cvars(ctx: &CvarContext) -> Self {
        let level = ctx.variable_value("save_compression_level").clamp(0.0, 9.0) as u32;
        let dir = ctx.variable_string("save_dir");
        Self {
            compression_level: level,
            intern_strings: ctx.variable_value("save_intern_strings") != 0.0,
            save_dir: if dir.is_empty() { "save".to_string() } else { dir.to_string() },
            checkpoints: ctx.variable_value("save_checkpoints") != 0.0,
        }
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        let mut ctx = CvarContext::new();
        save_register_cvars(&mut ctx);
        Self::from_cvars(&ctx)
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = Mutex::new(None);

pub fn cvar_init() {
    let mut ctx = CvarContext::new();
    save_register_cvars(&mut ctx);
    *CVAR_CTX.lock() = Some(ctx);
}

pub fn cvar_shutdown() {
    *CVAR_CTX.lock() = None;
}

pub fn cvar_set(name: &str, value: &str) {
    if let Some(ref mut c) = *CVAR_CTX.lock() {
        c.set(name, value);
    }
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

/// Access the global cvar context with a closure. Returns None if not initialized.
pub fn with_cvar_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CvarContext) -> R,
{
    let mut g = CVAR_CTX.lock();
    g.as_mut().map(f)
}

/// Save configuration from the global cvars, if the cvar system is up.
pub fn cvar_save_config() -> Option<SaveConfig> {
    with_cvar_ctx(|c| SaveConfig::from_cvars(c))
}

// ============================================================
// Tests
// ============================================================
