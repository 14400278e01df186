use alloc::{string::String, vec::Vec};
use core::{fmt, str::FromStr};

/// A learner permitted to use the portal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    /// Last four digits of the member's phone number. Doubles as the admin passcode.
    pub suffix: String,
    pub admin: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// An entry is not of the form `name:1234` or `name:1234:admin`.
    Malformed,
    /// The phone suffix is not exactly four ASCII digits.
    BadSuffix,
    /// The same name appears twice.
    Duplicate,
    /// No entries at all.
    Empty,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Malformed => "roster entries must look like `name:1234` or `name:1234:admin`",
            Self::BadSuffix => "phone suffix must be exactly four digits",
            Self::Duplicate => "roster contains a duplicate name",
            Self::Empty => "roster is empty",
        })
    }
}

/// The allow-list of members.
#[derive(Clone, Debug, Default)]
pub struct Roster(Vec<Member>);

impl Roster {
    /// Finds the member whose name and phone suffix both match exactly.
    pub fn verify(&self, name: &str, suffix: &str) -> Option<&Member> {
        self.0.iter().find(|member| member.name == name && member.suffix == suffix)
    }

    /// Same as [`verify`](Self::verify), but only admins pass.
    pub fn verify_admin(&self, name: &str, code: &str) -> Option<&Member> {
        self.verify(name, code).filter(|member| member.admin)
    }

    pub fn members(&self) -> &[Member] {
        &self.0
    }
}

impl FromStr for Roster {
    type Err = Error;

    /// Parses comma-separated `name:suffix[:admin]` entries.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut members = Vec::<Member>::new();
        for entry in text.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let mut parts = entry.split(':').map(str::trim);
            let name = parts.next().filter(|name| !name.is_empty()).ok_or(Error::Malformed)?;
            let suffix = parts.next().ok_or(Error::Malformed)?;
            let admin = match parts.next() {
                None => false,
                Some("admin") => true,
                Some(_) => return Err(Error::Malformed),
            };
            if parts.next().is_some() {
                return Err(Error::Malformed);
            }
            if suffix.len() != 4 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::BadSuffix);
            }
            if members.iter().any(|member| member.name == name) {
                return Err(Error::Duplicate);
            }
            members.push(Member { name: name.into(), suffix: suffix.into(), admin });
        }

        if members.is_empty() {
            return Err(Error::Empty);
        }

        Ok(Self(members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_members_and_admin_flag() {
        let roster: Roster = "Yoon:8664:admin, Song:1525 ,Kim:9440".parse().unwrap();
        assert_eq!(roster.members().len(), 3);
        assert_eq!(roster.members().iter().filter(|member| member.admin).count(), 1);
        assert!(roster.verify("Yoon", "8664").unwrap().admin);
        assert!(!roster.verify("Song", "1525").unwrap().admin);
    }

    #[test]
    fn verification_needs_both_fields() {
        let roster: Roster = "Yoon:8664:admin,Song:1525".parse().unwrap();
        assert!(roster.verify("Yoon", "1525").is_none());
        assert!(roster.verify("Song", "8664").is_none());
        assert!(roster.verify("song", "1525").is_none());
        assert!(roster.verify("Nobody", "0000").is_none());
    }

    #[test]
    fn only_admins_unlock_admin_pages() {
        let roster: Roster = "Yoon:8664:admin,Song:1525".parse().unwrap();
        assert!(roster.verify_admin("Yoon", "8664").is_some());
        assert!(roster.verify_admin("Song", "1525").is_none());
    }

    #[test]
    fn rejects_bad_entries() {
        assert_eq!("Yoon".parse::<Roster>().unwrap_err(), Error::Malformed);
        assert_eq!(":1234".parse::<Roster>().unwrap_err(), Error::Malformed);
        assert_eq!("Yoon:1234:root".parse::<Roster>().unwrap_err(), Error::Malformed);
        assert_eq!("Yoon:12a4".parse::<Roster>().unwrap_err(), Error::BadSuffix);
        assert_eq!("Yoon:12345".parse::<Roster>().unwrap_err(), Error::BadSuffix);
        assert_eq!("Yoon:1234,Yoon:5678".parse::<Roster>().unwrap_err(), Error::Duplicate);
        assert_eq!(" , ".parse::<Roster>().unwrap_err(), Error::Empty);
    }
}
