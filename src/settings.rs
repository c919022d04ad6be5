use serde::{Deserialize, Serialize};

/// All user-configurable tool options, persisted to JSON.
#[derive(Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub tool: ToolSettings,
    pub filters: FilterSettings,
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ToolSettings {
    pub snapping: bool,
    pub follow_terrain: bool,
    /// Keyboard nudges move along world axes instead of camera-relative.
    pub use_cardinal_moves: bool,
    /// Right mouse button cancels a pending clone instead of rotating it.
    pub rmb_cancels_cloning: bool,
    pub undo_limit: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            snapping: false,
            follow_terrain: true,
            use_cardinal_moves: false,
            rmb_cancels_cloning: false,
            undo_limit: 100,
        }
    }
}

/// Which entity kinds marquee selection picks up.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FilterSettings {
    pub buildings: bool,
    pub props: bool,
    pub decals: bool,
    pub trees: bool,
    pub nodes: bool,
    pub segments: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            buildings: true,
            props: true,
            decals: true,
            trees: true,
            nodes: true,
            segments: true,
        }
    }
}

impl Settings {
    /// Load settings from config file. Falls back to defaults on error.
    pub fn load() -> Self {
        let path = config_path();
        if path.exists()
            && let Ok(data) = std::fs::read_to_string(&path)
            && let Ok(settings) = serde_json::from_str::<Settings>(&data)
        {
            return settings;
        }
        Self::default()
    }

    /// Save settings to config file.
    pub fn save(&self) {
        let path = config_path();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(data) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(&path, data);
        }
    }
}

fn config_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    std::path::PathBuf::from(home).join(".config/movekit/settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_missing_fields() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.tool.follow_terrain);
        assert!(!settings.tool.snapping);
        assert_eq!(settings.tool.undo_limit, 100);
        assert!(settings.filters.trees);
    }

    #[test]
    fn roundtrip() {
        let mut settings = Settings::default();
        settings.tool.snapping = true;
        settings.filters.decals = false;
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert!(back.tool.snapping);
        assert!(!back.filters.decals);
    }
}
