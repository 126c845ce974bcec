//! Codec des annonces SSDP.
//!
//! Trois formes circulent sur le groupe multicast : les NOTIFY
//! (alive/byebye), les réponses HTTP/1.1 200 aux recherches, et les
//! M-SEARCH. Le parseur aiguille sur le premier jeton du datagramme ;
//! les en-têtes sont appariés sans sensibilité à la casse, `\r` retiré.
//! Parser puis réémettre une annonce préserve chaque champ reconnu.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::{SSDP_MULTICAST_ADDR, SSDP_PORT};

/// Sous-type de notification : annonce de présence.
pub const NTS_ALIVE: &str = "ssdp:alive";

/// Sous-type de notification : retrait.
pub const NTS_BYEBYE: &str = "ssdp:byebye";

/// Erreur de parsing d'un datagramme SSDP.
#[derive(Debug, Error)]
pub enum SsdpParseError {
    #[error("unknown SSDP message: {0}")]
    UnknownMessage(String),

    #[error("missing required header {0}")]
    MissingHeader(&'static str),

    #[error("invalid header {header}: {value}")]
    InvalidHeader { header: &'static str, value: String },
}

/// Annonce SSDP parsée.
#[derive(Debug, Clone)]
pub enum Advertisement {
    Notification(Notification),
    Response(SearchResponse),
    Search(Search),
}

impl Advertisement {
    /// Parse un datagramme SSDP.
    ///
    /// Aiguillage sur le premier jeton : `NOTIFY` → notification,
    /// `HTTP/1.1 200` → réponse de recherche, `M-SEARCH` → recherche.
    pub fn parse(data: &str) -> Result<Advertisement, SsdpParseError> {
        let mut lines = data.lines().map(|l| l.trim_end_matches('\r'));
        let first_line = lines
            .next()
            .ok_or_else(|| SsdpParseError::UnknownMessage(String::new()))?
            .trim();
        let headers = parse_headers(lines);

        let upper = first_line.to_ascii_uppercase();
        if upper.starts_with("NOTIFY") {
            Notification::from_headers(&headers).map(Advertisement::Notification)
        } else if upper.starts_with("HTTP/1.1 200") {
            SearchResponse::from_headers(&headers).map(Advertisement::Response)
        } else if upper.starts_with("M-SEARCH") {
            Search::from_headers(&headers).map(Advertisement::Search)
        } else {
            Err(SsdpParseError::UnknownMessage(first_line.to_string()))
        }
    }

    /// Date de fin de validité, si elle est connue.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        match self {
            Advertisement::Notification(n) => n.expiration(),
            Advertisement::Response(r) => r.expiration(),
            Advertisement::Search(s) => Some(s.expiration()),
        }
    }

    /// Vraie si la validité est connue et dépassée.
    pub fn expired(&self) -> bool {
        self.expiration().map(|e| Utc::now() > e).unwrap_or(false)
    }
}

/// NOTIFY alive ou byebye.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Date de réception (ou en-tête DATE le cas échéant)
    pub date: DateTime<Utc>,

    /// Hôte du groupe multicast
    pub host: String,

    /// Port du groupe multicast
    pub port: u16,

    /// URL de la description, absente pour un byebye
    pub location: Option<String>,

    /// Durée de validité, absente pour un byebye
    pub max_age: Option<u32>,

    /// Type de notification (NT)
    pub nt: String,

    /// Sous-type (NTS) : `ssdp:alive` ou `ssdp:byebye`
    pub nts: String,

    /// Identité du serveur, absente pour un byebye
    pub server: Option<String>,

    /// Nom unique (USN)
    pub usn: String,
}

impl Notification {
    fn from_headers(headers: &HashMap<String, String>) -> Result<Self, SsdpParseError> {
        let (host, port) = parse_host(headers)?;
        Ok(Self {
            date: header_date(headers),
            host,
            port,
            location: headers.get("LOCATION").cloned(),
            max_age: parse_max_age(headers.get("CACHE-CONTROL")),
            nt: required(headers, "NT")?,
            nts: required(headers, "NTS")?,
            server: headers.get("SERVER").cloned(),
            usn: required(headers, "USN")?,
        })
    }

    pub fn alive(&self) -> bool {
        self.nts == NTS_ALIVE
    }

    pub fn byebye(&self) -> bool {
        self.nts == NTS_BYEBYE
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.max_age
            .map(|age| self.date + Duration::seconds(age.into()))
    }

    pub fn expired(&self) -> bool {
        self.expiration().map(|e| Utc::now() > e).unwrap_or(false)
    }

    /// Forme câble du NOTIFY. Un byebye omet CACHE-CONTROL, LOCATION
    /// et SERVER.
    pub fn to_wire(&self) -> String {
        let mut msg = format!(
            "NOTIFY * HTTP/1.1\r\nHOST: {}:{}\r\n",
            self.host, self.port
        );
        if let Some(age) = self.max_age {
            msg.push_str(&format!("CACHE-CONTROL: max-age={}\r\n", age));
        }
        if let Some(location) = &self.location {
            msg.push_str(&format!("LOCATION: {}\r\n", location));
        }
        msg.push_str(&format!("NT: {}\r\nNTS: {}\r\n", self.nt, self.nts));
        if let Some(server) = &self.server {
            msg.push_str(&format!("SERVER: {}\r\n", server));
        }
        msg.push_str(&format!("USN: {}\r\n\r\n", self.usn));
        msg
    }
}

/// Réponse HTTP/1.1 200 à un M-SEARCH.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// Date de réception (ou en-tête DATE)
    pub date: DateTime<Utc>,

    /// Durée de validité
    pub max_age: Option<u32>,

    /// URL de la description
    pub location: Option<String>,

    /// Identité du serveur
    pub server: Option<String>,

    /// Cible recherchée (ST)
    pub st: String,

    /// Nom unique (USN)
    pub usn: String,

    /// Présence de l'en-tête `EXT:`
    pub ext: bool,
}

impl SearchResponse {
    fn from_headers(headers: &HashMap<String, String>) -> Result<Self, SsdpParseError> {
        Ok(Self {
            date: header_date(headers),
            max_age: parse_max_age(headers.get("CACHE-CONTROL")),
            location: headers.get("LOCATION").cloned(),
            server: headers.get("SERVER").cloned(),
            st: required(headers, "ST")?,
            usn: required(headers, "USN")?,
            ext: headers.contains_key("EXT"),
        })
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.max_age
            .map(|age| self.date + Duration::seconds(age.into()))
    }

    pub fn expired(&self) -> bool {
        self.expiration().map(|e| Utc::now() > e).unwrap_or(false)
    }

    /// Forme câble de la réponse de recherche.
    pub fn to_wire(&self) -> String {
        let mut msg = String::from("HTTP/1.1 200 OK\r\n");
        if let Some(age) = self.max_age {
            msg.push_str(&format!("CACHE-CONTROL: max-age={}\r\n", age));
        }
        msg.push_str(&format!(
            "DATE: {}\r\nEXT:\r\n",
            self.date.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
        if let Some(location) = &self.location {
            msg.push_str(&format!("LOCATION: {}\r\n", location));
        }
        if let Some(server) = &self.server {
            msg.push_str(&format!("SERVER: {}\r\n", server));
        }
        msg.push_str(&format!(
            "ST: {}\r\nNTS: {}\r\nUSN: {}\r\nContent-Length: 0\r\n\r\n",
            self.st, NTS_ALIVE, self.usn
        ));
        msg
    }
}

/// M-SEARCH entrant ou sortant.
#[derive(Debug, Clone)]
pub struct Search {
    /// Date de réception
    pub date: DateTime<Utc>,

    /// Cible recherchée (ST)
    pub st: String,

    /// Temps d'attente maximal (MX, secondes)
    pub mx: u32,
}

impl Search {
    fn from_headers(headers: &HashMap<String, String>) -> Result<Self, SsdpParseError> {
        let mx_raw = required(headers, "MX")?;
        let mx = mx_raw
            .parse::<u32>()
            .map_err(|_| SsdpParseError::InvalidHeader {
                header: "MX",
                value: mx_raw.clone(),
            })?;
        Ok(Self {
            date: Utc::now(),
            st: required(headers, "ST")?,
            mx,
        })
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.date + Duration::seconds(self.mx.into())
    }

    pub fn expired(&self) -> bool {
        Utc::now() > self.expiration()
    }

    /// Forme câble du M-SEARCH.
    pub fn to_wire(&self) -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {}:{}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {}\r\n\
             ST: {}\r\n\
             \r\n",
            SSDP_MULTICAST_ADDR, SSDP_PORT, self.mx, self.st
        )
    }
}

fn required(headers: &HashMap<String, String>, name: &'static str) -> Result<String, SsdpParseError> {
    headers
        .get(name)
        .cloned()
        .ok_or(SsdpParseError::MissingHeader(name))
}

fn parse_host(headers: &HashMap<String, String>) -> Result<(String, u16), SsdpParseError> {
    let raw = required(headers, "HOST")?;
    match raw.split_once(':') {
        Some((host, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| SsdpParseError::InvalidHeader {
                    header: "HOST",
                    value: raw.clone(),
                })?;
            Ok((host.trim().to_string(), port))
        }
        None => Ok((raw, SSDP_PORT)),
    }
}

fn header_date(headers: &HashMap<String, String>) -> DateTime<Utc> {
    headers
        .get("DATE")
        .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Apparie les lignes d'en-tête, nom en majuscules, sans la ligne vide
/// terminale. Le découpage se fait sur le premier `:` seulement, les
/// valeurs pouvant en contenir.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_uppercase();
            if !name.is_empty() {
                headers.insert(name, value.trim().to_string());
            }
        }
    }
    headers
}

/// Extrait `max-age=<n>` d'un en-tête CACHE-CONTROL.
fn parse_max_age(value: Option<&String>) -> Option<u32> {
    let v = value?;
    let lower = v.to_ascii_lowercase();
    let idx = lower.find("max-age")?;
    let after = v[idx + "max-age".len()..]
        .trim_start()
        .trim_start_matches('=')
        .trim_start();
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIVE: &str = "NOTIFY * HTTP/1.1\r\n\
        HOST: 239.255.255.250:1900\r\n\
        CACHE-CONTROL: max-age=10\r\n\
        LOCATION: http://example.com/root_device.xml\r\n\
        NT: upnp:rootdevice\r\n\
        NTS: ssdp:alive\r\n\
        SERVER: OS/5 UPnP/1.0 product/7\r\n\
        USN: uuid:BOGUS::upnp:rootdevice\r\n\
        \r\n";

    #[test]
    fn test_parse_notify_alive() {
        let ad = Advertisement::parse(ALIVE).unwrap();
        let n = match ad {
            Advertisement::Notification(n) => n,
            other => panic!("expected a notification, got {:?}", other),
        };

        assert_eq!(n.host, "239.255.255.250");
        assert_eq!(n.port, 1900);
        assert_eq!(n.max_age, Some(10));
        assert_eq!(
            n.location.as_deref(),
            Some("http://example.com/root_device.xml")
        );
        assert_eq!(n.nt, "upnp:rootdevice");
        assert_eq!(n.nts, "ssdp:alive");
        assert_eq!(n.server.as_deref(), Some("OS/5 UPnP/1.0 product/7"));
        assert_eq!(n.usn, "uuid:BOGUS::upnp:rootdevice");
        assert!(n.alive());
        assert!(!n.byebye());
        assert!(!n.expired());
    }

    #[test]
    fn test_parse_notify_byebye() {
        let text = "NOTIFY * HTTP/1.1\r\n\
            HOST: 239.255.255.250:1900\r\n\
            NT: upnp:rootdevice\r\n\
            NTS: ssdp:byebye\r\n\
            USN: uuid:BOGUS::upnp:rootdevice\r\n\
            \r\n";

        let ad = Advertisement::parse(text).unwrap();
        let n = match ad {
            Advertisement::Notification(n) => n,
            other => panic!("expected a notification, got {:?}", other),
        };

        assert!(n.byebye());
        assert!(!n.alive());
        assert_eq!(n.location, None);
        assert_eq!(n.max_age, None);
        // Pas de max-age : pas d'expiration connue
        assert_eq!(n.expiration(), None);
        assert!(!n.expired());
    }

    #[test]
    fn test_parse_search() {
        let text = "M-SEARCH * HTTP/1.1\r\n\
            HOST: 239.255.255.250:1900\r\n\
            MAN: \"ssdp:discover\"\r\n\
            MX: 2\r\n\
            ST: upnp:rootdevice\r\n\
            \r\n";

        let ad = Advertisement::parse(text).unwrap();
        let s = match ad {
            Advertisement::Search(s) => s,
            other => panic!("expected a search, got {:?}", other),
        };
        assert_eq!(s.st, "upnp:rootdevice");
        assert_eq!(s.mx, 2);
    }

    #[test]
    fn test_parse_search_response() {
        let text = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=120\r\n\
            DATE: Sun, 02 Aug 2026 10:00:00 GMT\r\n\
            EXT:\r\n\
            LOCATION: http://192.0.2.5:8080/description\r\n\
            SERVER: OS/5 UPnP/1.0 product/7\r\n\
            ST: upnp:rootdevice\r\n\
            USN: uuid:BOGUS::upnp:rootdevice\r\n\
            Content-Length: 0\r\n\
            \r\n";

        let ad = Advertisement::parse(text).unwrap();
        let r = match ad {
            Advertisement::Response(r) => r,
            other => panic!("expected a response, got {:?}", other),
        };
        assert_eq!(r.max_age, Some(120));
        assert!(r.ext);
        assert_eq!(r.st, "upnp:rootdevice");
        assert_eq!(
            r.location.as_deref(),
            Some("http://192.0.2.5:8080/description")
        );
    }

    #[test]
    fn test_unknown_first_token_rejected() {
        assert!(matches!(
            Advertisement::parse("GET / HTTP/1.1\r\n\r\n"),
            Err(SsdpParseError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let text = "NOTIFY * HTTP/1.1\r\n\
            host: 239.255.255.250:1900\r\n\
            nt: upnp:rootdevice\r\n\
            nts: ssdp:alive\r\n\
            usn: uuid:x\r\n\
            cache-control: MAX-AGE = 30\r\n\
            \r\n";

        let ad = Advertisement::parse(text).unwrap();
        if let Advertisement::Notification(n) = ad {
            assert_eq!(n.max_age, Some(30));
            assert_eq!(n.nt, "upnp:rootdevice");
        } else {
            panic!("expected a notification");
        }
    }

    #[test]
    fn test_notify_round_trip_preserves_fields() {
        let ad = Advertisement::parse(ALIVE).unwrap();
        let n = match ad {
            Advertisement::Notification(n) => n,
            _ => unreachable!(),
        };

        let reparsed = Advertisement::parse(&n.to_wire()).unwrap();
        let m = match reparsed {
            Advertisement::Notification(m) => m,
            _ => panic!("round trip changed the variant"),
        };

        assert_eq!(m.host, n.host);
        assert_eq!(m.port, n.port);
        assert_eq!(m.location, n.location);
        assert_eq!(m.max_age, n.max_age);
        assert_eq!(m.nt, n.nt);
        assert_eq!(m.nts, n.nts);
        assert_eq!(m.server, n.server);
        assert_eq!(m.usn, n.usn);
    }

    #[test]
    fn test_response_round_trip_preserves_fields() {
        let response = SearchResponse {
            date: Utc::now(),
            max_age: Some(120),
            location: Some("http://192.0.2.5:8080/description".to_string()),
            server: Some("OS/5 UPnP/1.0 product/7".to_string()),
            st: "upnp:rootdevice".to_string(),
            usn: "uuid:x::upnp:rootdevice".to_string(),
            ext: true,
        };

        let reparsed = Advertisement::parse(&response.to_wire()).unwrap();
        let r = match reparsed {
            Advertisement::Response(r) => r,
            _ => panic!("round trip changed the variant"),
        };
        assert_eq!(r.max_age, response.max_age);
        assert_eq!(r.location, response.location);
        assert_eq!(r.server, response.server);
        assert_eq!(r.st, response.st);
        assert_eq!(r.usn, response.usn);
        assert!(r.ext);
    }

    #[test]
    fn test_search_round_trip_preserves_fields() {
        let search = Search {
            date: Utc::now(),
            st: "ssdp:all".to_string(),
            mx: 3,
        };
        let reparsed = Advertisement::parse(&search.to_wire()).unwrap();
        if let Advertisement::Search(s) = reparsed {
            assert_eq!(s.st, search.st);
            assert_eq!(s.mx, search.mx);
        } else {
            panic!("round trip changed the variant");
        }
    }

    #[test]
    fn test_missing_required_header() {
        let text = "NOTIFY * HTTP/1.1\r\n\
            HOST: 239.255.255.250:1900\r\n\
            NTS: ssdp:alive\r\n\
            USN: uuid:x\r\n\
            \r\n";
        assert!(matches!(
            Advertisement::parse(text),
            Err(SsdpParseError::MissingHeader("NT"))
        ));
    }
}
