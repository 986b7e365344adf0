// common.rs — console print front-end shared by the save subsystem
//
// The engine talks to the console through Com_Printf-style helpers. Here they
// sit on top of the `log` facade so the host application decides where the
// text ends up.

use crate::cvar::cvar_variable_value;

/// Distribution name and version, shown in save listings.
pub const DISTNAME: &str = "VSave";
pub const DISTVER: f32 = 1.0;

// ============================================================
// Com_Printf / Com_DPrintf / Com_Warning
// ============================================================

/// General-purpose user-visible message.
pub fn com_printf(msg: &str) {
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Warning that the user should see but that does not stop the operation.
pub fn com_warning(msg: &str) {
    log::warn!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print. Silent unless `developer` or `save_verbose` is set.
pub fn com_dprintf(msg: &str) {
    if !developer_enabled() {
        return;
    }
    log::debug!("{}", msg.trim_end_matches('\n'));
}

/// True when verbose save diagnostics were requested.
pub fn developer_enabled() -> bool {
    cvar_variable_value("developer") != 0.0 || cvar_variable_value("save_verbose") != 0.0
}

// ============================================================
// Fixed-size string helpers
// ============================================================

/// Copy `s` into a NUL-padded fixed buffer, truncating to `N - 1` bytes.
pub fn to_fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N.saturating_sub(1));
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Read a NUL-padded fixed buffer back into a string.
pub fn from_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
