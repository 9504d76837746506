//! Connection descriptor for remote BMC targets.
//!
//! A target is described by a compact string of the form
//! `[username[:password]@][protocol[(address)]]`, e.g.
//! `root:passwd@lan(192.168.1.1)`. Parsing never fails: components missing
//! from the string simply stay empty, and semantic validation is left to
//! ipmitool itself.

/// Parsed connection parameters for one remote BMC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub protocol: String,
    pub privilege: String,
}

impl Connection {
    /// Parses a connection string. Missing components default to empty
    /// strings; malformed input degrades to a partially-empty descriptor
    /// rather than an error.
    pub fn new(server: &str, privilege: &str) -> Self {
        let mut conn = Connection {
            privilege: privilege.to_string(),
            ..Connection::default()
        };

        // Credentials end at the last '@' so passwords may contain one.
        let mut rest = server;
        if let Some(at) = rest.rfind('@') {
            let security = &rest[..at];
            rest = &rest[at + 1..];
            match security.split_once(':') {
                Some((user, pass)) => {
                    conn.username = user.to_string();
                    conn.password = pass.to_string();
                }
                None => conn.username = security.to_string(),
            }
        }

        match rest.find('(') {
            Some(open) => {
                conn.protocol = rest[..open].to_string();
                let addr = &rest[open + 1..];
                conn.hostname = match addr.find(')') {
                    Some(close) => addr[..close].to_string(),
                    None => addr.to_string(),
                };
            }
            None => conn.protocol = rest.to_string(),
        }

        conn
    }

    /// Renders the ipmitool command-line options for this connection.
    /// Empty values are still emitted positionally; only the privilege flag
    /// is conditional.
    pub fn options(&self) -> Vec<String> {
        let mut options = vec![
            "-I".to_string(),
            self.protocol.clone(),
            "-H".to_string(),
            self.hostname.clone(),
            "-U".to_string(),
            self.username.clone(),
            "-P".to_string(),
            self.password.clone(),
        ];

        if !self.privilege.is_empty() {
            options.push("-L".to_string());
            options.push(self.privilege.clone());
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_connection_string() {
        let conn = Connection::new("root:pw@lan(10.0.0.5)", "");
        assert_eq!(conn.username, "root");
        assert_eq!(conn.password, "pw");
        assert_eq!(conn.protocol, "lan");
        assert_eq!(conn.hostname, "10.0.0.5");
    }

    #[test]
    fn test_no_credentials() {
        let conn = Connection::new("lan(10.0.0.5)", "");
        assert_eq!(conn.username, "");
        assert_eq!(conn.password, "");
        assert_eq!(conn.protocol, "lan");
        assert_eq!(conn.hostname, "10.0.0.5");
    }

    #[test]
    fn test_empty_string_yields_empty_descriptor() {
        let conn = Connection::new("", "");
        assert_eq!(conn, Connection::default());
    }

    #[test]
    fn test_username_without_password() {
        let conn = Connection::new("admin@lanplus(bmc.example.com)", "");
        assert_eq!(conn.username, "admin");
        assert_eq!(conn.password, "");
        assert_eq!(conn.protocol, "lanplus");
        assert_eq!(conn.hostname, "bmc.example.com");
    }

    #[test]
    fn test_password_containing_at_sign() {
        let conn = Connection::new("root:p@ss@lan(192.168.1.1)", "");
        assert_eq!(conn.username, "root");
        assert_eq!(conn.password, "p@ss");
        assert_eq!(conn.hostname, "192.168.1.1");
    }

    #[test]
    fn test_protocol_without_address() {
        let conn = Connection::new("lan", "");
        assert_eq!(conn.protocol, "lan");
        assert_eq!(conn.hostname, "");
    }

    #[test]
    fn test_options_rendering() {
        let conn = Connection::new("root:pw@lan(10.0.0.5)", "");
        assert_eq!(
            conn.options(),
            vec!["-I", "lan", "-H", "10.0.0.5", "-U", "root", "-P", "pw"]
        );
    }

    #[test]
    fn test_options_with_privilege() {
        let conn = Connection::new("root:pw@lan(10.0.0.5)", "ADMINISTRATOR");
        let options = conn.options();
        assert_eq!(&options[8..], &["-L", "ADMINISTRATOR"]);
    }

    #[test]
    fn test_options_emit_empty_values_positionally() {
        let conn = Connection::new("lan(10.0.0.5)", "");
        assert_eq!(
            conn.options(),
            vec!["-I", "lan", "-H", "10.0.0.5", "-U", "", "-P", ""]
        );
    }
}
