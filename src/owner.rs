//! Per-session owner identity for lock ownership, per spec §4.2.
//!
//! Two panes in the same tmux window share ownership (an agent that
//! re-spawns into the same pane keeps its lock); two independent terminal
//! windows must not.

use rand::RngCore;

/// A stable per-session identity string used to decide lock ownership.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerIdentity(String);

impl OwnerIdentity {
    /// Compute the owner identity from the environment, following the
    /// precedence order in spec §4.2:
    /// explicit override → tmux → terminal-emulator session id → random.
    #[must_use]
    pub fn from_env() -> Self {
        Self::resolve(&EnvSource)
    }

    /// Resolve against an injectable environment source, for testing.
    pub(crate) fn resolve(env: &dyn EnvLookup) -> Self {
        if let Some(explicit) = env.var("WTX_OWNER_ID") {
            if !explicit.is_empty() {
                return Self(format!("explicit:{explicit}"));
            }
        }

        if env.var("WTX_DISABLE_TMUX").is_none() {
            if let Some(tmux) = env.var("TMUX") {
                let session_id = tmux.split(',').nth(1).unwrap_or(&tmux).to_owned();
                let id = match env.var("TMUX_PANE") {
                    Some(window) => format!("tmux:{session_id}:{window}"),
                    None => format!("tmux:{session_id}"),
                };
                return Self(id);
            }
        }

        if let Some(iterm) = env.var("TERM_SESSION_ID") {
            return Self(format!("iterm:{iterm}"));
        }
        if let Some(wezterm) = env.var("WEZTERM_PANE") {
            return Self(format!("wezterm:{wezterm}"));
        }
        if let Some(kitty) = env.var("KITTY_WINDOW_ID") {
            return Self(format!("kitty:{kitty}"));
        }

        Self(random_fallback(env))
    }

    /// The raw identity string, e.g. `"tmux:$3:%1"` or `"explicit:agent-a"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
impl OwnerIdentity {
    /// Build an identity directly from a string, bypassing env resolution.
    /// Used by other modules' tests (lock, pool, orchestrator) that need a
    /// fixed owner without faking the whole environment.
    pub(crate) fn literal(s: &str) -> Self {
        Self(s.to_owned())
    }
}

fn random_fallback(env: &dyn EnvLookup) -> String {
    let user = env.var("USER").unwrap_or_else(|| "unknown".to_owned());
    let host = env.var("HOSTNAME").unwrap_or_else(|| "localhost".to_owned());
    let pid = std::process::id();
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{user}@{host}:{pid}:{hex}")
}

/// Indirection over `std::env::var` so ownership resolution is testable
/// without mutating the real process environment.
pub(crate) trait EnvLookup {
    fn var(&self, key: &str) -> Option<String>;
}

struct EnvSource;

impl EnvLookup for EnvSource {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeEnv(HashMap<&'static str, &'static str>);

    impl EnvLookup for FakeEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| (*v).to_owned())
        }
    }

    #[test]
    fn explicit_override_wins() {
        let env = FakeEnv(HashMap::from([("WTX_OWNER_ID", "agent-1"), ("TMUX", "/tmp/x,3,0")]));
        let id = OwnerIdentity::resolve(&env);
        assert_eq!(id.as_str(), "explicit:agent-1");
    }

    #[test]
    fn tmux_session_and_pane() {
        let env = FakeEnv(HashMap::from([("TMUX", "/tmp/tmux-1000/default,1234,0"), ("TMUX_PANE", "%3")]));
        let id = OwnerIdentity::resolve(&env);
        assert_eq!(id.as_str(), "tmux:1234:%3");
    }

    #[test]
    fn tmux_disabled_falls_through() {
        let env = FakeEnv(HashMap::from([
            ("TMUX", "/tmp/tmux-1000/default,1234,0"),
            ("WTX_DISABLE_TMUX", "1"),
            ("TERM_SESSION_ID", "w0t1p0"),
        ]));
        let id = OwnerIdentity::resolve(&env);
        assert_eq!(id.as_str(), "iterm:w0t1p0");
    }

    #[test]
    fn iterm_session_id_used_without_tmux() {
        let env = FakeEnv(HashMap::from([("TERM_SESSION_ID", "w0t2p1")]));
        let id = OwnerIdentity::resolve(&env);
        assert_eq!(id.as_str(), "iterm:w0t2p1");
    }

    #[test]
    fn wezterm_pane_used_when_no_tmux_or_iterm() {
        let env = FakeEnv(HashMap::from([("WEZTERM_PANE", "7")]));
        let id = OwnerIdentity::resolve(&env);
        assert_eq!(id.as_str(), "wezterm:7");
    }

    #[test]
    fn kitty_window_id_used_as_last_specific_signal() {
        let env = FakeEnv(HashMap::from([("KITTY_WINDOW_ID", "42")]));
        let id = OwnerIdentity::resolve(&env);
        assert_eq!(id.as_str(), "kitty:42");
    }

    #[test]
    fn falls_back_to_random_identity_when_nothing_else_present() {
        let env = FakeEnv(HashMap::new());
        let id = OwnerIdentity::resolve(&env);
        assert!(id.as_str().contains(&std::process::id().to_string()));
    }

    #[test]
    fn two_calls_without_signals_differ_by_random_suffix() {
        let env = FakeEnv(HashMap::new());
        let a = OwnerIdentity::resolve(&env);
        let b = OwnerIdentity::resolve(&env);
        assert_ne!(a.as_str(), b.as_str());
    }
}
