//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The sub directory of the user's home where topobox keeps its state by default.
pub const TOPOBOX_HOME_DIR: &str = ".topobox";

/// The sub directory where sandbox records are stored.
pub const SANDBOXES_SUBDIR: &str = "sandboxes";

/// The sub directory where template definitions are stored.
pub const TEMPLATES_SUBDIR: &str = "templates";

/// The sub directory where per-sandbox lock files are stored.
pub const LOCKS_SUBDIR: &str = "locks";

/// The sub directory holding base images.
pub const IMAGES_SUBDIR: &str = "images";

/// The filename of the optional settings file in the home directory.
pub const SETTINGS_FILENAME: &str = "settings.yaml";

/// The extension of a sandbox record.
pub const RECORD_EXTENSION: &str = "json";

/// The extension of a template definition.
pub const TEMPLATE_EXTENSION: &str = "yaml";

/// The extension of a lock file.
pub const LOCK_EXTENSION: &str = "lock";
