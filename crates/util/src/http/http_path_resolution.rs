use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

/// Resolves an address template by replacing `{key}` placeholders with
/// percent-encoded values from `variables`.
///
/// Placeholder names are trimmed, so `{ id }` and `{id}` are equivalent.
/// Placeholders without a matching variable remain unchanged.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use tether_util::build_path;
///
/// let variables = json!({ "account_id": "acc 1" });
/// let path = build_path("/accounts/{account_id}/mails", variables.as_object().unwrap());
/// assert_eq!(path, "/accounts/acc%201/mails");
/// ```
pub fn build_path(template: &str, variables: &Map<String, Value>) -> String {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|offset| open + offset) else {
            break;
        };
        path.push_str(&rest[..open]);
        let placeholder = &rest[open..=close];
        match variables.get(placeholder[1..placeholder.len() - 1].trim()) {
            Some(value) => {
                let raw = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                path.push_str(&utf8_percent_encode(&raw, NON_ALPHANUMERIC).to_string());
            }
            None => path.push_str(placeholder),
        }
        rest = &rest[close + 1..];
    }
    path.push_str(rest);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fills_multiple_placeholders_and_keeps_unknown_ones() {
        let variables = json!({ "user_id": "user_1", "order_id": 7 });
        let path = build_path("/users/{user_id}/orders/{order_id}/{missing}", variables.as_object().expect("object"));
        assert_eq!(path, "/users/user_1/orders/7/{missing}");
    }

    #[test]
    fn placeholder_names_are_trimmed() {
        let variables = json!({ "order_id": "o 1" });
        let path = build_path("/orders/{ order_id }/items", variables.as_object().expect("object"));
        assert_eq!(path, "/orders/o%201/items");
    }
}
