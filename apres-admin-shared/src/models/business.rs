/// Business model
///
/// A business listed in the directory. Only `town_id` and `classification`
/// carry meaning for the backend; the remaining attributes are stored and
/// returned as-is.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE businesses (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(200) NOT NULL,
///     town_id INTEGER REFERENCES towns(id),
///     city_id INTEGER,
///     state_id INTEGER,
///     classification VARCHAR(100),
///     physical_address VARCHAR(255),
///     zipcode VARCHAR(20),
///     website_url VARCHAR(255),
///     facebook_page VARCHAR(255),
///     instagram_page VARCHAR(255),
///     x_page VARCHAR(255),
///     best_of_apres_ski BOOLEAN NOT NULL DEFAULT FALSE,
///     apres_ski_membership_years INTEGER[] NOT NULL DEFAULT '{}'
/// );
/// ```
///
/// `town_id` is nullable so a business can outlive its town (see
/// `LinkedChildren::Detach`).

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use validator::{Validate, ValidationError};

/// The fixed set of classifications a business may carry
pub const VALID_CLASSIFICATIONS: [&str; 5] = [
    "Double Diamond (21+ Only)",
    "Black Diamond (Adults Only Recommended)",
    "Blue Square + Double Diamond (Family-Friendly during day, 21+ After 9p)",
    "Blue Square (Family-Friendly)",
    "Green Circle (All Ages)",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: i32,
    pub name: String,
    pub town_id: Option<i32>,
    pub city_id: Option<i32>,
    pub state_id: Option<i32>,
    pub classification: Option<String>,
    pub physical_address: Option<String>,
    pub zipcode: Option<String>,
    pub website_url: Option<String>,
    pub facebook_page: Option<String>,
    pub instagram_page: Option<String>,
    pub x_page: Option<String>,
    pub best_of_apres_ski: bool,
    pub apres_ski_membership_years: Vec<i32>,
}

fn validate_classification(value: &str) -> Result<(), ValidationError> {
    if VALID_CLASSIFICATIONS.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("classification");
        err.message = Some("classification must be one of the fixed classifications".into());
        Err(err)
    }
}

/// Request payload for creating or updating a business
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BusinessPayload {
    #[serde(alias = "venue_name")]
    #[validate(
        required(message = "name is required"),
        length(max = 200, message = "name must be at most 200 characters")
    )]
    pub name: Option<String>,

    /// Required on create; on update an omitted town leaves the business where it is
    #[serde(default, alias = "townId", deserialize_with = "crate::models::lenient_id")]
    pub town_id: Option<i32>,

    #[serde(default, alias = "cityId", deserialize_with = "crate::models::lenient_id")]
    pub city_id: Option<i32>,

    #[serde(default, alias = "stateId", deserialize_with = "crate::models::lenient_id")]
    pub state_id: Option<i32>,

    #[validate(custom(function = "validate_classification"))]
    pub classification: Option<String>,

    #[serde(alias = "physicalAddress")]
    pub physical_address: Option<String>,

    pub zipcode: Option<String>,

    #[serde(alias = "websiteUrl")]
    #[validate(url(message = "website_url must be a valid URL"))]
    pub website_url: Option<String>,

    #[serde(alias = "facebookPage")]
    pub facebook_page: Option<String>,

    #[serde(alias = "instagramPage")]
    pub instagram_page: Option<String>,

    #[serde(alias = "xPage")]
    pub x_page: Option<String>,

    #[serde(default, alias = "bestOfApresSki")]
    pub best_of_apres_ski: bool,

    #[serde(default, alias = "apresSkiMembershipYears")]
    pub apres_ski_membership_years: Vec<i32>,
}

/// Validated input for inserting a business
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBusiness {
    pub name: String,
    pub town_id: i32,
    pub city_id: Option<i32>,
    pub state_id: Option<i32>,
    pub classification: Option<String>,
    pub physical_address: Option<String>,
    pub zipcode: Option<String>,
    pub website_url: Option<String>,
    pub facebook_page: Option<String>,
    pub instagram_page: Option<String>,
    pub x_page: Option<String>,
    pub best_of_apres_ski: bool,
    pub apres_ski_membership_years: Vec<i32>,
}

impl CreateBusiness {
    /// Materializes a business row from this input
    pub fn into_business(self, id: i32) -> Business {
        Business {
            id,
            name: self.name,
            town_id: Some(self.town_id),
            city_id: self.city_id,
            state_id: self.state_id,
            classification: self.classification,
            physical_address: self.physical_address,
            zipcode: self.zipcode,
            website_url: self.website_url,
            facebook_page: self.facebook_page,
            instagram_page: self.instagram_page,
            x_page: self.x_page,
            best_of_apres_ski: self.best_of_apres_ski,
            apres_ski_membership_years: self.apres_ski_membership_years,
        }
    }
}

/// Validated replacement for a business's fields
///
/// Everything is overwritten except `town_id`, which only changes when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBusiness {
    pub name: String,
    pub town_id: Option<i32>,
    pub city_id: Option<i32>,
    pub state_id: Option<i32>,
    pub classification: Option<String>,
    pub physical_address: Option<String>,
    pub zipcode: Option<String>,
    pub website_url: Option<String>,
    pub facebook_page: Option<String>,
    pub instagram_page: Option<String>,
    pub x_page: Option<String>,
    pub best_of_apres_ski: bool,
    pub apres_ski_membership_years: Vec<i32>,
}

impl UpdateBusiness {
    pub fn apply_to(self, business: &mut Business) {
        business.name = self.name;
        if let Some(town_id) = self.town_id {
            business.town_id = Some(town_id);
        }
        business.city_id = self.city_id;
        business.state_id = self.state_id;
        business.classification = self.classification;
        business.physical_address = self.physical_address;
        business.zipcode = self.zipcode;
        business.website_url = self.website_url;
        business.facebook_page = self.facebook_page;
        business.instagram_page = self.instagram_page;
        business.x_page = self.x_page;
        business.best_of_apres_ski = self.best_of_apres_ski;
        business.apres_ski_membership_years = self.apres_ski_membership_years;
    }
}

/// Filters accepted by business listings; all set filters must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessFilter {
    pub town_ids: Option<Vec<i32>>,
    pub city_id: Option<i32>,
    pub classification: Option<String>,
}

impl BusinessFilter {
    pub fn matches(&self, business: &Business) -> bool {
        let town_ok = match &self.town_ids {
            Some(ids) => business.town_id.is_some_and(|id| ids.contains(&id)),
            None => true,
        };
        let city_ok = self.city_id.map_or(true, |id| business.city_id == Some(id));
        let class_ok = self
            .classification
            .as_deref()
            .map_or(true, |c| business.classification.as_deref() == Some(c));

        town_ok && city_ok && class_ok
    }
}

const BUSINESS_COLUMNS: &str = "id, name, town_id, city_id, state_id, classification, \
     physical_address, zipcode, website_url, facebook_page, instagram_page, x_page, \
     best_of_apres_ski, apres_ski_membership_years";

impl Business {
    pub async fn create(pool: &PgPool, data: CreateBusiness) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Business>(&format!(
            r#"
            INSERT INTO businesses (
                name, town_id, city_id, state_id, classification, physical_address,
                zipcode, website_url, facebook_page, instagram_page, x_page,
                best_of_apres_ski, apres_ski_membership_years
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {BUSINESS_COLUMNS}
            "#
        ))
        .bind(data.name)
        .bind(data.town_id)
        .bind(data.city_id)
        .bind(data.state_id)
        .bind(data.classification)
        .bind(data.physical_address)
        .bind(data.zipcode)
        .bind(data.website_url)
        .bind(data.facebook_page)
        .bind(data.instagram_page)
        .bind(data.x_page)
        .bind(data.best_of_apres_ski)
        .bind(data.apres_ski_membership_years)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Business>(&format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists businesses matching every filter that is set
    pub async fn list(pool: &PgPool, filter: &BusinessFilter) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Business>(&format!(
            r#"
            SELECT {BUSINESS_COLUMNS} FROM businesses
            WHERE ($1::INTEGER[] IS NULL OR town_id = ANY($1))
              AND ($2::INTEGER IS NULL OR city_id = $2)
              AND ($3::VARCHAR IS NULL OR classification = $3)
            ORDER BY name, id
            "#
        ))
        .bind(filter.town_ids.as_deref())
        .bind(filter.city_id)
        .bind(filter.classification.as_deref())
        .fetch_all(pool)
        .await
    }

    /// Overwrites a business; `None` when no row has this ID
    pub async fn update(
        pool: &PgPool,
        id: i32,
        data: UpdateBusiness,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Business>(&format!(
            r#"
            UPDATE businesses SET
                name = $2, town_id = COALESCE($3, town_id), city_id = $4, state_id = $5,
                classification = $6, physical_address = $7, zipcode = $8, website_url = $9,
                facebook_page = $10, instagram_page = $11, x_page = $12,
                best_of_apres_ski = $13, apres_ski_membership_years = $14
            WHERE id = $1
            RETURNING {BUSINESS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.town_id)
        .bind(data.city_id)
        .bind(data.state_id)
        .bind(data.classification)
        .bind(data.physical_address)
        .bind(data.zipcode)
        .bind(data.website_url)
        .bind(data.facebook_page)
        .bind(data.instagram_page)
        .bind(data.x_page)
        .bind(data.best_of_apres_ski)
        .bind(data.apres_ski_membership_years)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Business>(&format!(
            "DELETE FROM businesses WHERE id = $1 RETURNING {BUSINESS_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_by_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM businesses WHERE town_id = ANY($1)")
                .bind(town_ids)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }

    pub async fn delete_by_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM businesses WHERE town_id = ANY($1)")
            .bind(town_ids)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Clears the town reference of every business in these towns
    pub async fn detach_from_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE businesses SET town_id = NULL WHERE town_id = ANY($1)")
            .bind(town_ids)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(classification: Option<&str>) -> BusinessPayload {
        BusinessPayload {
            name: Some("The Red Lion".to_string()),
            town_id: Some(1),
            classification: classification.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_known_classification_accepted() {
        for c in VALID_CLASSIFICATIONS {
            assert!(payload(Some(c)).validate().is_ok(), "{c} should be accepted");
        }
        assert!(payload(None).validate().is_ok());
    }

    #[test]
    fn test_unknown_classification_rejected() {
        let err = payload(Some("Bunny Hill")).validate().unwrap_err();
        assert!(err.field_errors().contains_key("classification"));
    }

    #[test]
    fn test_payload_accepts_camel_case() {
        let p: BusinessPayload =
            serde_json::from_str(r#"{"name":"Belly Up","townId":4,"bestOfApresSki":true}"#)
                .unwrap();
        assert_eq!(p.town_id, Some(4));
        assert!(p.best_of_apres_ski);
    }

    #[test]
    fn test_filter_matches() {
        let business = CreateBusiness {
            name: "Belly Up".to_string(),
            town_id: 4,
            city_id: Some(9),
            classification: Some("Green Circle (All Ages)".to_string()),
            ..Default::default()
        }
        .into_business(1);

        assert!(BusinessFilter::default().matches(&business));
        assert!(BusinessFilter { town_ids: Some(vec![3, 4]), ..Default::default() }.matches(&business));
        assert!(!BusinessFilter { town_ids: Some(vec![]), ..Default::default() }.matches(&business));
        assert!(!BusinessFilter { city_id: Some(1), ..Default::default() }.matches(&business));
        assert!(!BusinessFilter {
            classification: Some("Double Diamond (21+ Only)".to_string()),
            ..Default::default()
        }
        .matches(&business));
    }
}
