//! Authentication-authority attribute parsing.
//!
//! A record's authority attribute holds entries of the form
//! `;version;TAG;data`. The first entry whose tag is recognized selects
//! the handler for the whole request; unrecognized entries are skipped,
//! not rejected, so newer tags pass through older nodes untouched.

/// Recognized authority tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityTag {
    /// Legacy cleartext-comparable secret held in record attributes.
    Basic,
    /// Local multi-algorithm credential file.
    ShadowHash,
    /// A remote password-server node owns the credential.
    PasswordServer,
    /// Local credential kept in sync with a realm principal.
    Kerberos,
    /// Certificate-mapped realm principal; local ops match `Kerberos`.
    KerberosCert,
    /// Wraps another entry; the account is administratively disabled.
    DisabledUser,
    /// Local replica of a network account, verified two-phase when the
    /// network node is reachable.
    LocalCachedUser,
}

impl AuthorityTag {
    fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "Basic" => Self::Basic,
            "ShadowHash" => Self::ShadowHash,
            "ApplePasswordServer" | "PasswordServer" => Self::PasswordServer,
            "Kerberosv5" | "Kerberos" => Self::Kerberos,
            "KerberosCert" => Self::KerberosCert,
            "DisabledUser" => Self::DisabledUser,
            "LocalCachedUser" => Self::LocalCachedUser,
            _ => return None,
        })
    }

    /// Canonical tag text written back into rendered entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::ShadowHash => "ShadowHash",
            Self::PasswordServer => "PasswordServer",
            Self::Kerberos => "Kerberos",
            Self::KerberosCert => "KerberosCert",
            Self::DisabledUser => "DisabledUser",
            Self::LocalCachedUser => "LocalCachedUser",
        }
    }
}

/// One parsed authority entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityEntry {
    /// Version segment, usually `1`. Carried through verbatim.
    pub version: String,
    /// The recognized tag.
    pub tag: AuthorityTag,
    /// Everything after the tag's trailing separator, tag-specific.
    pub data: String,
}

impl AuthorityEntry {
    /// Parses one `;version;TAG;data` entry.
    ///
    /// Returns `None` for entries that are malformed or carry an
    /// unrecognized tag; the caller skips those.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(';')?;
        let (version, rest) = rest.split_once(';')?;
        let (tag_text, data) = match rest.split_once(';') {
            Some((tag_text, data)) => (tag_text, data),
            None => (rest, ""),
        };
        let tag = AuthorityTag::parse(tag_text)?;
        Some(Self {
            version: version.to_string(),
            tag,
            data: data.to_string(),
        })
    }

    /// Renders back to attribute form.
    #[must_use]
    pub fn render(&self) -> String {
        format!(";{};{};{}", self.version, self.tag.as_str(), self.data)
    }
}

/// Picks the first recognized entry from an authority attribute value list.
///
/// An empty list means a record that predates authority attributes; those
/// carry their secret the `Basic` way.
#[must_use]
pub fn resolve<S: AsRef<str>>(entries: &[S]) -> Option<AuthorityEntry> {
    entries.iter().find_map(|e| AuthorityEntry::parse(e.as_ref()))
}
