//! Emplacements persistants du runtime.
//!
//! Tout l'état durable vit sous un répertoire unique, `~/.UPnP` par
//! défaut : les devices sérialisés (un fichier par couple
//! type/friendly name) et le fichier d'identifiant de nœud utilisé par
//! le générateur d'UUID. La variable d'environnement `UPNP_HOME`
//! remplace le répertoire par défaut (tests, conteneurs).

use std::env;
use std::path::PathBuf;

/// Nom du fichier contenant l'identifiant de nœud (12 hexadécimaux).
pub const NODE_ID_FILE: &str = "uuid_mac_address";

/// Variable d'environnement remplaçant le répertoire par défaut.
pub const ENV_UPNP_HOME: &str = "UPNP_HOME";

/// Retourne le répertoire racine de l'état persistant.
pub fn upnp_home() -> PathBuf {
    if let Ok(dir) = env::var(ENV_UPNP_HOME) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".UPnP")
}

/// Chemin du cache d'un device dans un répertoire racine donné.
pub fn device_cache_path_in(base: &std::path::Path, device_type: &str, friendly_name: &str) -> PathBuf {
    base.join(device_type).join(friendly_name)
}

/// Chemin du cache d'un device sous le répertoire par défaut.
pub fn device_cache_path(device_type: &str, friendly_name: &str) -> PathBuf {
    device_cache_path_in(&upnp_home(), device_type, friendly_name)
}

/// Chemin du fichier d'identifiant de nœud.
pub fn node_id_path() -> PathBuf {
    upnp_home().join(NODE_ID_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_cache_layout() {
        let base = std::path::Path::new("/tmp/upnp-test");
        let path = device_cache_path_in(base, "MediaServer", "Salon");
        assert_eq!(path, PathBuf::from("/tmp/upnp-test/MediaServer/Salon"));
    }
}
