//! # Module uuidgen - UUID version 1
//!
//! Générateur d'UUID RFC 4122 version 1 (horodatés) pour les UDN de
//! devices. L'identifiant de nœud (48 bits) est lu depuis un fichier
//! persistant écrit une seule fois ; en son absence un nœud aléatoire
//! marqué (quartet haut forcé à `0xF`) est substitué, de sorte qu'il ne
//! puisse pas être confondu avec une vraie adresse MAC.
//!
//! La monotonie du couple (horloge, séquence) est garantie par une
//! section critique sous mutex : le générateur se partage entre threads.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tracing::warn;
use uuid::Uuid;

use crate::config;

/// Horloge UUID : secondes murales multipliées par 10 000 000 (ticks de
/// 100 ns), tronquées à 60 bits.
const CLOCK_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

/// Au-delà de cette dérive cumulée on rend la main et on relit l'horloge.
const MAX_DRIFT: u32 = 10_000;

struct ClockState {
    last_clock: u64,
    sequence: u16,
    drift: u32,
}

/// Générateur d'UUID v1 partageable entre threads.
pub struct UuidGenerator {
    node: [u8; 6],
    state: Mutex<ClockState>,
}

impl UuidGenerator {
    /// Crée un générateur dont le nœud vient du fichier persistant par
    /// défaut (créé au premier appel s'il n'existe pas).
    pub fn new() -> io::Result<Self> {
        Self::with_node_file(&config::node_id_path())
    }

    /// Crée un générateur dont le nœud vient du fichier donné. Le
    /// fichier est écrit une seule fois et jamais renouvelé.
    pub fn with_node_file(path: &Path) -> io::Result<Self> {
        let node = match fs::read_to_string(path) {
            Ok(text) => parse_node(text.trim()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid node id file {}", path.display()),
                )
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let node = random_node();
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, format_node(&node))?;
                node
            }
            Err(e) => return Err(e),
        };
        Ok(Self::with_node(node))
    }

    /// Crée un générateur avec un nœud explicite.
    pub fn with_node(node: [u8; 6]) -> Self {
        Self {
            node,
            state: Mutex::new(ClockState {
                last_clock: 0,
                sequence: rand::random::<u16>(),
                drift: 0,
            }),
        }
    }

    pub fn node(&self) -> [u8; 6] {
        self.node
    }

    /// Génère le prochain UUID v1.
    pub fn generate(&self) -> Uuid {
        let (clock, sequence) = self.next_clock();
        build_v1(clock, sequence, &self.node)
    }

    /// Forme compacte : 32 hexadécimaux sans tirets.
    pub fn generate_compact(&self) -> String {
        self.generate().simple().to_string()
    }

    /// Forme par défaut : 8-4-4-4-12 avec tirets.
    pub fn generate_default(&self) -> String {
        self.generate().hyphenated().to_string()
    }

    /// Forme URN : préfixée `urn:uuid:`.
    pub fn generate_urn(&self) -> String {
        self.generate().urn().to_string()
    }

    /// Section critique : avance l'horloge en garantissant des couples
    /// (horloge, séquence) strictement croissants sous un même nœud.
    fn next_clock(&self) -> (u64, u16) {
        loop {
            let now = wall_clock_ticks();
            let mut state = self.state.lock().unwrap();

            if now > state.last_clock {
                state.last_clock = now;
                state.drift = 0;
            } else if now == state.last_clock {
                if state.drift >= MAX_DRIFT {
                    drop(state);
                    std::thread::yield_now();
                    continue;
                }
                state.drift += 1;
                state.last_clock += 1;
            } else {
                // L'horloge murale a reculé : nouvelle séquence aléatoire
                state.sequence = rand::random::<u16>();
                state.last_clock = now;
                state.drift = 0;
            }

            return (state.last_clock, state.sequence);
        }
    }
}

/// Générateur du processus, initialisé paresseusement depuis le fichier
/// de nœud par défaut ; replié sur un nœud aléatoire non persistant si
/// le fichier est illisible.
static GENERATOR: Lazy<UuidGenerator> = Lazy::new(|| match UuidGenerator::new() {
    Ok(generator) => generator,
    Err(e) => {
        warn!("❌ Cannot read or create node id file: {}, using a volatile random node", e);
        UuidGenerator::with_node(random_node())
    }
});

/// Génère un UUID v1 avec le générateur du processus.
pub fn generate() -> Uuid {
    GENERATOR.generate()
}

fn wall_clock_ticks() -> u64 {
    let ticks = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_nanos() / 100) as u64)
        .unwrap_or(0);
    ticks & CLOCK_MASK
}

fn build_v1(clock: u64, sequence: u16, node: &[u8; 6]) -> Uuid {
    let time_low = (clock & 0xFFFF_FFFF) as u32;
    let time_mid = ((clock >> 32) & 0xFFFF) as u16;
    // Le quartet de version 0x1 entre dans les 16 bits hauts de l'horloge
    let time_hi_and_version = (((clock >> 48) & 0x0FFF) as u16) | 0x1000;

    // Variante RFC 4122 (bits 10) sur l'octet haut de la séquence
    let clock_seq_hi = (((sequence >> 8) as u8) & 0x3F) | 0x80;
    let clock_seq_low = (sequence & 0xFF) as u8;

    let d4 = [
        clock_seq_hi,
        clock_seq_low,
        node[0],
        node[1],
        node[2],
        node[3],
        node[4],
        node[5],
    ];

    Uuid::from_fields(time_low, time_mid, time_hi_and_version, &d4)
}

/// Nœud aléatoire marqué "pas une vraie MAC" : quartet haut forcé.
fn random_node() -> [u8; 6] {
    let bits = 0xF000_0000_0000u64 | (rand::random::<u64>() & 0xFFFF_FFFF_FFFF);
    let bytes = bits.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

fn parse_node(text: &str) -> Option<[u8; 6]> {
    if text.len() != 12 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let mut node = [0u8; 6];
    for (i, chunk) in text.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        node[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(node)
}

fn format_node(node: &[u8; 6]) -> String {
    node.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_and_variant_bits() {
        let generator = UuidGenerator::with_node([0, 1, 2, 3, 4, 5]);
        let uuid = generator.generate();

        assert_eq!(uuid.get_version_num(), 1);
        // Variante RFC 4122 : les deux bits hauts de l'octet 8 valent 10
        assert_eq!(uuid.as_bytes()[8] & 0xC0, 0x80);
    }

    #[test]
    fn test_node_preserved_in_uuid() {
        let node = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x42];
        let generator = UuidGenerator::with_node(node);
        let uuid = generator.generate();
        assert_eq!(&uuid.as_bytes()[10..], &node);
    }

    #[test]
    fn test_sequential_calls_strictly_increase() {
        let generator = UuidGenerator::with_node([0; 6]);
        let mut previous = None;
        for _ in 0..1000 {
            let uuid = generator.generate();
            let pair = uuid.get_timestamp().unwrap().to_rfc4122();
            if let Some(prev) = previous {
                assert!(pair > prev, "clock/sequence pair must strictly increase");
            }
            previous = Some(pair);
        }
    }

    #[test]
    fn test_output_formats() {
        let generator = UuidGenerator::with_node([0; 6]);
        let compact = generator.generate_compact();
        let hyphenated = generator.generate_default();
        let urn = generator.generate_urn();

        assert_eq!(compact.len(), 32);
        assert_eq!(hyphenated.len(), 36);
        assert!(urn.starts_with("urn:uuid:"));
    }

    #[test]
    fn test_node_file_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uuid_mac_address");

        let first = UuidGenerator::with_node_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.len(), 12);

        let second = UuidGenerator::with_node_file(&path).unwrap();
        assert_eq!(first.node(), second.node());
        // Le quartet haut marque un nœud substitué
        assert_eq!(first.node()[0] & 0xF0, 0xF0);
    }

    #[test]
    fn test_corrupt_node_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uuid_mac_address");
        std::fs::write(&path, "not-hex-at-all").unwrap();
        assert!(UuidGenerator::with_node_file(&path).is_err());
    }
}
