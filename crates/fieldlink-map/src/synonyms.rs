//! Static phrase table of alternate label phrasings.

use std::collections::BTreeMap;

use fieldlink_model::TargetRef;

use crate::utils::label_key;

const PRIMARY: &str = "Contact";

/// Common form phrasings and the target they mean.
const DEFAULT_SYNONYMS: &[(&str, &str, &str)] = &[
    ("family name", "LastName", PRIMARY),
    ("last name", "LastName", PRIMARY),
    ("surname", "LastName", PRIMARY),
    ("given name", "FirstName", PRIMARY),
    ("first name", "FirstName", PRIMARY),
    ("date of birth", "Birthdate", PRIMARY),
    ("dob", "Birthdate", PRIMARY),
    ("birth date", "Birthdate", PRIMARY),
    ("a number", "A_Number__c", PRIMARY),
    ("a-number", "A_Number__c", PRIMARY),
    ("alien registration number", "A_Number__c", PRIMARY),
    ("gender", "Gender__c", PRIMARY),
    ("sex", "Gender__c", PRIMARY),
    ("marital status", "Marital_status__c", PRIMARY),
    ("country of nationality", "Country__c", PRIMARY),
    ("country of citizenship", "Country__c", PRIMARY),
    ("country of birth", "Country__c", PRIMARY),
    ("city of birth", "City_of_Birth__c", PRIMARY),
    ("place of birth", "City_of_Birth__c", PRIMARY),
    ("street", "MailingStreet", PRIMARY),
    ("address", "MailingStreet", PRIMARY),
    ("mailing address", "MailingStreet", PRIMARY),
    ("city", "MailingCity", PRIMARY),
    ("state", "MailingState", PRIMARY),
    ("province", "MailingState", PRIMARY),
    ("zip", "MailingPostalCode", PRIMARY),
    ("zip code", "MailingPostalCode", PRIMARY),
    ("postal code", "MailingPostalCode", PRIMARY),
    ("phone", "Phone", PRIMARY),
    ("telephone", "Phone", PRIMARY),
    ("daytime phone", "Phone", PRIMARY),
    ("mobile", "MobilePhone", PRIMARY),
    ("cell phone", "MobilePhone", PRIMARY),
    ("email", "Email", PRIMARY),
    ("e-mail", "Email", PRIMARY),
    ("email address", "Email", PRIMARY),
    ("language", "Best_Language__c", PRIMARY),
    ("case number", "CaseNumber__c", PRIMARY),
    ("immigration status", "Immigration_Status__c", PRIMARY),
    ("spouse name", "Spouse_Name__c", PRIMARY),
];

/// Lowercased phrase to `(target object, target field)`.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: BTreeMap<String, TargetRef>,
}

impl SynonymTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(phrase, target field, target object)` triples.
    ///
    /// A phrase listed twice keeps its first target.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let mut table = Self::default();
        for (phrase, field, object) in entries {
            table.insert(phrase, field, object);
        }
        table
    }

    pub fn insert(&mut self, phrase: &str, field: &str, object: &str) {
        self.entries
            .entry(label_key(phrase))
            .or_insert_with(|| TargetRef {
                object: object.to_string(),
                field: field.to_string(),
            });
    }

    pub fn get(&self, label: &str) -> Option<&TargetRef> {
        self.entries.get(&label_key(label))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The built-in table for the primary contact record.
pub fn default_synonyms() -> SynonymTable {
    SynonymTable::from_entries(DEFAULT_SYNONYMS.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = default_synonyms();
        let target = table.get("Family Name").unwrap();
        assert_eq!(target.field, "LastName");
        assert_eq!(target.object, "Contact");
        assert!(table.get("Favourite Colour").is_none());
    }

    #[test]
    fn first_entry_wins_for_duplicate_phrases() {
        let table = SynonymTable::from_entries([
            ("alias", "Alias__c", "Contact"),
            ("Alias", "Other__c", "Plus"),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("alias").unwrap().field, "Alias__c");
    }
}
