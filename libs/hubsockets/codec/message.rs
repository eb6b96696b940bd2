use serde_json::Value;

/// One fragment pulled out of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Parsed JSON object or array
    Structured(Value),
    /// Candidate that failed to parse, kept verbatim
    Raw(String),
}

impl Fragment {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Fragment::Structured(v) => Some(v),
            Fragment::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Fragment::Raw(_))
    }
}

/// A single hub method invocation carried by a streaming frame
///
/// Wire shape: `{"H": <hub>, "M": <method>, "A": [<args>...]}` with
/// lowercase keys accepted as a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct HubInvocation {
    pub hub: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl HubInvocation {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let hub = field(obj, "H", "h").and_then(Value::as_str)?.to_string();
        let method = field(obj, "M", "m")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let args = field(obj, "A", "a")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Some(Self { hub, method, args })
    }

    /// Case-insensitive hub comparison (hub names are not case-stable on the wire)
    pub fn is_hub(&self, hub: &str) -> bool {
        self.hub.eq_ignore_ascii_case(hub)
    }
}

fn field<'a>(
    obj: &'a serde_json::Map<String, Value>,
    upper: &str,
    lower: &str,
) -> Option<&'a Value> {
    obj.get(upper).filter(|v| !v.is_null()).or_else(|| obj.get(lower))
}

/// Decoded unit handed to the dispatcher
///
/// Carries the fragment verbatim plus the invocations found in it. Raw
/// placeholders and keep-alive objects (`{}`) have no invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub fragment: Fragment,
    pub invocations: Vec<HubInvocation>,
}

impl DecodedMessage {
    pub fn from_fragment(fragment: Fragment) -> Self {
        let invocations = match &fragment {
            Fragment::Structured(value) => extract_invocations(value),
            Fragment::Raw(_) => Vec::new(),
        };
        Self {
            fragment,
            invocations,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.fragment.as_value()
    }

    pub fn is_keep_alive(&self) -> bool {
        matches!(&self.fragment, Fragment::Structured(Value::Object(o)) if o.is_empty())
    }
}

fn extract_invocations(value: &Value) -> Vec<HubInvocation> {
    let Some(obj) = value.as_object() else {
        return Vec::new();
    };
    field(obj, "M", "m")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(HubInvocation::from_value).collect())
        .unwrap_or_default()
}
