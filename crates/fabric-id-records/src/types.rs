//! Identity record type definitions.

use serde::{Deserialize, Serialize};

/// Identity record stored in the ledger world state, keyed by `id`
///
/// The JSON field names are the wire format shared with ledger clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub dob: String,
    pub present_address: String,
    pub permanent_address: String,
    pub gender: String,
    #[serde(rename = "nationalID")]
    pub national_id: String,
    /// Resolved identity of the creating caller. Ignored on input.
    pub owner: String,
}

impl IdentityRecord {
    /// Fields that must be non-empty on creation, paired with their wire names
    pub fn required_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("id", self.id.as_str()),
            ("firstName", self.first_name.as_str()),
            ("phone", self.phone.as_str()),
            ("nationalID", self.national_id.as_str()),
        ]
    }

    /// Wire name of the first empty required field, if any
    pub fn first_missing_field(&self) -> Option<&'static str> {
        self.required_fields()
            .into_iter()
            .find(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
    }
}

/// Partial update of an [`IdentityRecord`]
///
/// Absent and empty fields leave the stored value unchanged. `id` and
/// `owner` are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub present_address: Option<String>,
    pub permanent_address: Option<String>,
    pub gender: Option<String>,
    #[serde(rename = "nationalID")]
    pub national_id: Option<String>,
}

impl IdentityPatch {
    /// Apply every non-empty field to `record`
    pub fn apply_to(&self, record: &mut IdentityRecord) {
        fn merge(target: &mut String, value: &Option<String>) {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                *target = value.to_string();
            }
        }

        merge(&mut record.first_name, &self.first_name);
        merge(&mut record.last_name, &self.last_name);
        merge(&mut record.phone, &self.phone);
        merge(&mut record.email, &self.email);
        merge(&mut record.dob, &self.dob);
        merge(&mut record.present_address, &self.present_address);
        merge(&mut record.permanent_address, &self.permanent_address);
        merge(&mut record.gender, &self.gender);
        merge(&mut record.national_id, &self.national_id);
    }

    /// True when no field would change anything
    pub fn is_empty(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.phone,
            &self.email,
            &self.dob,
            &self.present_address,
            &self.permanent_address,
            &self.gender,
            &self.national_id,
        ]
        .iter()
        .all(|f| f.as_deref().map_or(true, str::is_empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_names() {
        let record = IdentityRecord {
            id: "u1".to_string(),
            first_name: "A".to_string(),
            national_id: "N1".to_string(),
            present_address: "Dhaka".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["firstName"], "A");
        assert_eq!(json["nationalID"], "N1");
        assert_eq!(json["presentAddress"], "Dhaka");
        assert_eq!(json["owner"], "");
    }

    #[test]
    fn test_record_missing_fields_default_to_empty() {
        let record: IdentityRecord =
            serde_json::from_str(r#"{"id":"u1","firstName":"A"}"#).unwrap();
        assert_eq!(record.phone, "");
        assert_eq!(record.first_missing_field(), Some("phone"));
    }

    #[test]
    fn test_patch_gates_each_field_on_its_own_value() {
        let mut record = IdentityRecord {
            id: "u1".to_string(),
            first_name: "A".to_string(),
            last_name: "L".to_string(),
            email: "a@example.com".to_string(),
            owner: "x509::owner".to_string(),
            ..Default::default()
        };

        // No firstName in the patch, yet email must still be applied.
        let patch = IdentityPatch {
            email: Some("b@example.com".to_string()),
            last_name: Some(String::new()),
            ..Default::default()
        };
        patch.apply_to(&mut record);

        assert_eq!(record.first_name, "A");
        assert_eq!(record.last_name, "L");
        assert_eq!(record.email, "b@example.com");
        assert_eq!(record.owner, "x509::owner");
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(IdentityPatch::default().is_empty());
        assert!(IdentityPatch {
            phone: Some(String::new()),
            ..Default::default()
        }
        .is_empty());
        assert!(!IdentityPatch {
            gender: Some("F".to_string()),
            ..Default::default()
        }
        .is_empty());
    }
}
