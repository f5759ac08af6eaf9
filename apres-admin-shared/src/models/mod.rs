/// Database models for the après-ski directory
///
/// Each model owns its queries as associated functions taking a pool (or any
/// executor when the call has to join a transaction).
///
/// # Models
///
/// - `user`: accounts and the role hierarchy
/// - `state`, `town`, `venue`, `business`, `band`: the geographic directory
/// - `calendar`: calendar types, event categories and subcategories
/// - `event`: events and their category links
///
/// # Example
///
/// ```no_run
/// use apres_admin_shared::models::town::{CreateTown, Town};
/// use apres_admin_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let town = Town::create(&pool, CreateTown {
///     name: "Vail".to_string(),
///     state_id: 1,
/// }).await?;
///
/// let towns = Town::list_by_state(&pool, town.state_id).await?;
/// # Ok(())
/// # }
/// ```

pub mod band;
pub mod business;
pub mod calendar;
pub mod event;
pub mod state;
pub mod town;
pub mod user;
pub mod venue;

use serde::{de::Error as _, Deserialize, Deserializer};

/// Reads an optional row id given as a JSON number or a numeric string
///
/// The admin console copies ids out of `data-*` attributes, so `"5"` and `5`
/// must both work. `null` and blank strings read as absent.
pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    let number = match Option::<RawId>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawId::Number(n)) => n,
        Some(RawId::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<i64>()
                .map_err(|_| D::Error::custom(format!("invalid id {text:?}, expected an integer")))?
        }
    };

    i32::try_from(number)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("id {number} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Parent {
        #[serde(default, deserialize_with = "lenient_id")]
        id: Option<i32>,
    }

    fn parse(json: &str) -> Result<Option<i32>, serde_json::Error> {
        serde_json::from_str::<Parent>(json).map(|p| p.id)
    }

    #[test]
    fn test_lenient_id_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse(r#"{"id":5}"#).unwrap(), Some(5));
        assert_eq!(parse(r#"{"id":"5"}"#).unwrap(), Some(5));
        assert_eq!(parse(r#"{"id":" 12 "}"#).unwrap(), Some(12));
    }

    #[test]
    fn test_lenient_id_absent_values() {
        assert_eq!(parse(r#"{}"#).unwrap(), None);
        assert_eq!(parse(r#"{"id":null}"#).unwrap(), None);
        assert_eq!(parse(r#"{"id":""}"#).unwrap(), None);
    }

    #[test]
    fn test_lenient_id_rejects_garbage() {
        assert!(parse(r#"{"id":"five"}"#).is_err());
        assert!(parse(r#"{"id":"4.5"}"#).is_err());
        assert!(parse(r#"{"id":4294967296}"#).is_err());
        assert!(parse(r#"{"id":true}"#).is_err());
    }
}
