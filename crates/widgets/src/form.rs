use parking_lot::RwLock;
use url::form_urlencoded;

/// Source of the edit form's current field values.
pub trait FormSource: Send + Sync {
    /// Url-encoded form body.
    fn payload(&self) -> String;
}

/// In-memory edit form.
#[derive(Debug, Default)]
pub struct FormState {
    fields: RwLock<Vec<(String, String)>>,
}

impl FormState {
    pub fn new<N, V>(fields: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: RwLock::new(
                fields
                    .into_iter()
                    .map(|(name, value)| (name.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut fields = self.fields.write();
        match fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, current)) => *current = value,
            None => fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.fields
            .read()
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
    }
}

impl FormSource for FormState {
    fn payload(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.read().iter())
            .finish()
    }
}
