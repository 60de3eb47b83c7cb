//! Resolves the world directory a generation job writes into.

use std::{
    collections::HashMap,
    env,
    fs::{self, File, TryLockError},
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use fastnbt::Value;
use flate2::{write::GzEncoder, Compression};
use tracing::{debug, warn};

use crate::selection::TargetRef;

const WORLD_NAME_PREFIX: &str = "Arnis World";

/// `level.dat` format version understood by current launchers (Anvil).
const LEVEL_VERSION: i32 = 19133;
/// Data version of Java Edition 1.21.
const DATA_VERSION: i32 = 3953;
/// Offset and timestamp tables of an empty region file.
const REGION_HEADER_LEN: usize = 8192;

/// The launcher's `saves` directory for the current OS.
pub fn default_saves_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(|appdata| PathBuf::from(appdata).join(".minecraft").join("saves"))
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| {
            home.join("Library/Application Support/minecraft")
                .join("saves")
        })
    } else if cfg!(target_os = "linux") {
        dirs::home_dir().map(|home| home.join(".minecraft").join("saves"))
    } else {
        None
    }
}

pub fn next_world_name(dir: &Path) -> String {
    let mut counter: u32 = 1;
    loop {
        let candidate = format!("{WORLD_NAME_PREFIX} {counter}");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Creates a loadable world under `<dir>/<next world name>` and returns its path.
pub fn create_world_dir(dir: &Path) -> Result<PathBuf> {
    let name = next_world_name(dir);
    let world = dir.join(&name);
    let region = world.join("region");
    fs::create_dir_all(&region)
        .with_context(|| format!("Failed to create world directory {}", world.display()))?;
    fs::write(region.join("r.0.0.mca"), [0u8; REGION_HEADER_LEN])
        .context("Failed to create region file")?;
    write_level_dat(&world, &name)?;
    debug!(path = %world.display(), "created world directory");
    Ok(world)
}

/// Writes a gzipped NBT `level.dat` naming the world.
pub fn write_level_dat(world: &Path, name: &str) -> Result<()> {
    let last_played = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_millis() as i64;

    let data = HashMap::from([
        ("LevelName".to_string(), Value::String(name.to_string())),
        ("LastPlayed".to_string(), Value::Long(last_played)),
        ("version".to_string(), Value::Int(LEVEL_VERSION)),
        ("DataVersion".to_string(), Value::Int(DATA_VERSION)),
        ("GameType".to_string(), Value::Int(1)),
        ("allowCommands".to_string(), Value::Byte(1)),
        ("initialized".to_string(), Value::Byte(1)),
    ]);
    let root = Value::Compound(HashMap::from([("Data".to_string(), Value::Compound(data))]));

    let nbt = fastnbt::to_bytes(&root).context("Failed to serialize level.dat")?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&nbt).context("Failed to compress level.dat")?;
    let compressed = encoder.finish().context("Failed to compress level.dat")?;
    fs::write(world.join("level.dat"), compressed)
        .with_context(|| format!("Failed to write level.dat in {}", world.display()))
}

/// True when another process holds `session.lock` in the world directory.
pub fn world_in_use(world: &Path) -> bool {
    let Ok(file) = File::open(world.join("session.lock")) else {
        return false;
    };
    match file.try_lock_shared() {
        Ok(()) => {
            let _ = file.unlock();
            false
        }
        Err(TryLockError::WouldBlock) => true,
        Err(TryLockError::Error(err)) => {
            warn!("failed to probe session.lock: {err}");
            false
        }
    }
}

/// Classifies a directory the user picked.
///
/// A directory with a `region` folder is an existing world, unless a running
/// game holds its `session.lock`. Any other directory becomes the parent of a
/// freshly created world.
pub fn resolve_existing(path: Option<&Path>) -> TargetRef {
    let Some(path) = path else {
        return TargetRef::NoTargetSelected;
    };
    if !path.is_dir() {
        return TargetRef::TargetRootNotFound;
    }
    if path.join("region").is_dir() {
        if world_in_use(path) {
            return TargetRef::TargetInUse;
        }
        return TargetRef::Selected(path.to_path_buf());
    }
    match create_world_dir(path) {
        Ok(world) => TargetRef::Selected(world),
        Err(err) => {
            warn!("{err:#}");
            TargetRef::InvalidTarget
        }
    }
}

/// Creates a fresh world inside the saves directory.
pub fn resolve_new(saves_dir: Option<&Path>) -> TargetRef {
    match saves_dir {
        Some(dir) if dir.is_dir() => match create_world_dir(dir) {
            Ok(world) => TargetRef::Selected(world),
            Err(err) => {
                warn!("{err:#}");
                TargetRef::InvalidTarget
            }
        },
        _ => TargetRef::TargetRootNotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn world_names_skip_existing_entries() {
        let temp = tempdir().unwrap();
        assert_eq!(next_world_name(temp.path()), "Arnis World 1");
        fs::create_dir(temp.path().join("Arnis World 1")).unwrap();
        fs::create_dir(temp.path().join("Arnis World 2")).unwrap();
        assert_eq!(next_world_name(temp.path()), "Arnis World 3");
    }

    #[test]
    fn no_path_means_nothing_selected() {
        assert_eq!(resolve_existing(None), TargetRef::NoTargetSelected);
    }

    #[test]
    fn missing_directory_is_root_not_found() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");
        assert_eq!(
            resolve_existing(Some(&missing)),
            TargetRef::TargetRootNotFound
        );
        assert_eq!(resolve_new(Some(&missing)), TargetRef::TargetRootNotFound);
        assert_eq!(resolve_new(None), TargetRef::TargetRootNotFound);
    }

    #[test]
    fn existing_world_is_selected_as_is() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("region")).unwrap();
        assert_eq!(
            resolve_existing(Some(temp.path())),
            TargetRef::Selected(temp.path().to_path_buf())
        );
    }

    #[test]
    fn plain_directory_gets_a_new_world() {
        let temp = tempdir().unwrap();
        let target = resolve_existing(Some(temp.path()));
        let expected = temp.path().join("Arnis World 1");
        assert_eq!(target, TargetRef::Selected(expected.clone()));
        assert!(expected.join("region").is_dir());

        let second = resolve_new(Some(temp.path()));
        assert_eq!(
            second,
            TargetRef::Selected(temp.path().join("Arnis World 2"))
        );
    }

    #[test]
    fn locked_world_is_in_use() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("region")).unwrap();
        let lock = File::create(temp.path().join("session.lock")).unwrap();
        lock.lock().unwrap();
        assert_eq!(resolve_existing(Some(temp.path())), TargetRef::TargetInUse);

        lock.unlock().unwrap();
        assert_eq!(
            resolve_existing(Some(temp.path())),
            TargetRef::Selected(temp.path().to_path_buf())
        );
    }

    #[test]
    fn unlocked_session_file_is_ignored() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("region")).unwrap();
        fs::write(temp.path().join("session.lock"), b"").unwrap();
        assert!(!world_in_use(temp.path()));
    }

    #[test]
    fn new_world_has_level_dat_and_region() {
        let temp = tempdir().unwrap();
        let TargetRef::Selected(world) = resolve_new(Some(temp.path())) else {
            panic!("expected a new world");
        };
        let region = fs::read(world.join("region").join("r.0.0.mca")).unwrap();
        assert_eq!(region.len(), REGION_HEADER_LEN);

        let mut nbt = Vec::new();
        GzDecoder::new(File::open(world.join("level.dat")).unwrap())
            .read_to_end(&mut nbt)
            .unwrap();
        let root: Value = fastnbt::from_bytes(&nbt).unwrap();
        let Value::Compound(root) = root else {
            panic!("root is not a compound");
        };
        let Some(Value::Compound(data)) = root.get("Data") else {
            panic!("missing Data compound");
        };
        assert_eq!(
            data.get("LevelName"),
            Some(&Value::String("Arnis World 1".to_string()))
        );
        assert!(matches!(data.get("LastPlayed"), Some(Value::Long(ms)) if *ms > 0));
    }
}
