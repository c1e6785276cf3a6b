//! Domain-to-organization lookup for discovered author emails.

/// Static, ordered table mapping email domain substrings to organization
/// names. First substring match wins; unmatched emails stay uncategorized.
pub struct CompanyResolver {
    table: Vec<(&'static str, &'static str)>,
}

impl Default for CompanyResolver {
    fn default() -> Self {
        Self {
            table: vec![
                ("amd.com", "AMD"),
                ("apple.com", "Apple"),
                ("arm.com", "ARM"),
                ("ericsson.com", "Ericsson"),
                ("fujitsu.com", "Fujitsu"),
                ("harvard.edu", "Harvard"),
                ("huawei.com", "Huawei"),
                ("ibm.com", "IBM"),
                ("inf.elte.hu", "ELTE FI"),
                ("intel.com", "Intel"),
                ("microsoft.com", "Microsoft"),
                ("nokia.com", "Nokia"),
                ("oracle.com", "Oracle"),
                ("sony.com", "Sony"),
                ("samsung.com", "Samsung"),
            ],
        }
    }
}

impl CompanyResolver {
    /// Resolve an email to an organization by substring containment.
    /// No normalization is applied.
    pub fn resolve(&self, email: &str) -> Option<&'static str> {
        self.table
            .iter()
            .find(|(domain, _)| email.contains(domain))
            .map(|(_, company)| *company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_domains() {
        let resolver = CompanyResolver::default();
        assert_eq!(resolver.resolve("alice@ibm.com"), Some("IBM"));
        assert_eq!(resolver.resolve("bob@mail.intel.com"), Some("Intel"));
        assert_eq!(resolver.resolve("carol@example.org"), None);
    }

    #[test]
    fn test_substring_containment_no_normalization() {
        let resolver = CompanyResolver::default();
        // Containment anywhere in the address counts.
        assert_eq!(resolver.resolve("ibm.com.spoof@evil.example"), Some("IBM"));
        // Case is not folded.
        assert_eq!(resolver.resolve("dave@IBM.COM"), None);
    }
}
