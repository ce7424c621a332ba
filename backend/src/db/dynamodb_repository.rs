use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use shared::ProviderKind;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::models::{GeolocationRecord, PredictionRecord, ProviderProfile, ProviderRecord, User};
use super::{
    GeolocationStore, PredictionLog, ProviderStore, RepositoryError, StoreFuture, UserStore,
};
use crate::config::TableNames;
use crate::geo::{BoundingBox, GeoPoint};

const IN_BOUNDING_BOX: &str =
    "latitude BETWEEN :min_lat AND :max_lat AND longitude BETWEEN :min_lon AND :max_lon";
const IN_WRAPPED_BOUNDING_BOX: &str =
    "latitude BETWEEN :min_lat AND :max_lat AND (longitude >= :min_lon OR longitude <= :max_lon)";

type Item = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    tables: TableNames,
}

impl DynamoDbRepository {
    pub fn new(client: Client, tables: TableNames) -> Self {
        Self { client, tables }
    }

    fn provider_table(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Agrovet => &self.tables.agrovets,
            ProviderKind::ExtensionWorker => &self.tables.extension_workers,
        }
    }

    async fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .set_condition_expression(condition.map(str::to_string))
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB put_item failed for table '{}': {:?}", table, e);
                RepositoryError::DynamoDb(e.to_string())
            })?;
        Ok(())
    }

    /// Scan following `LastEvaluatedKey` until the table is exhausted.
    async fn scan_all(
        &self,
        table: &str,
        filter_expression: Option<&str>,
        values: Option<Item>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(table)
                .set_filter_expression(filter_expression.map(str::to_string))
                .set_expression_attribute_values(values.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            items.extend(output.items.unwrap_or_default());
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        log::debug!("Scanned {} items from '{}'", items.len(), table);
        Ok(items)
    }

    async fn find_user_by(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut values = HashMap::new();
        values.insert(":value".to_string(), AttributeValue::S(value.to_string()));
        let filter = format!("{} = :value", attribute);

        let items = self
            .scan_all(&self.tables.users, Some(&filter), Some(values))
            .await?;
        items.first().map(parse_user).transpose()
    }

    async fn query_towns(&self, county: &str) -> Result<Vec<String>, RepositoryError> {
        let mut towns = BTreeSet::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.tables.geolocation)
                .key_condition_expression("county = :county")
                .expression_attribute_values(":county", AttributeValue::S(county.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                towns.insert(string_attr(&item, "town")?);
            }
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(towns.into_iter().collect())
    }
}

impl PredictionLog for DynamoDbRepository {
    fn append<'a>(&'a self, record: &'a PredictionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let item = prediction_to_item(record)?;
            self.put(&self.tables.predictions, item, None).await?;
            log::info!(
                "Recorded prediction {} for {} ({})",
                record.id,
                record.filename,
                record.disease
            );
            Ok(())
        })
    }
}

impl ProviderStore for DynamoDbRepository {
    fn insert<'a>(&'a self, record: &'a ProviderRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let table = self.provider_table(record.kind());
            self.put(table, provider_to_item(record), Some("attribute_not_exists(id)"))
                .await?;
            log::info!("Registered {} {} in '{}'", record.kind(), record.id, table);
            Ok(())
        })
    }

    fn within(
        &self,
        kind: ProviderKind,
        area: BoundingBox,
    ) -> StoreFuture<'_, Vec<ProviderRecord>> {
        Box::pin(async move {
            let mut values = HashMap::new();
            values.insert(":min_lat".to_string(), number(area.min_latitude));
            values.insert(":max_lat".to_string(), number(area.max_latitude));
            values.insert(":min_lon".to_string(), number(area.min_longitude));
            values.insert(":max_lon".to_string(), number(area.max_longitude));

            let filter = if area.crosses_antimeridian() {
                IN_WRAPPED_BOUNDING_BOX
            } else {
                IN_BOUNDING_BOX
            };
            let items = self
                .scan_all(self.provider_table(kind), Some(filter), Some(values))
                .await?;

            let mut records = Vec::with_capacity(items.len());
            for item in &items {
                match parse_provider(kind, item) {
                    Ok(record) => records.push(record),
                    Err(e) => log::warn!("Skipping malformed {} row: {}", kind, e),
                }
            }
            Ok(records)
        })
    }
}

impl GeolocationStore for DynamoDbRepository {
    fn insert<'a>(&'a self, record: &'a GeolocationRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.put(&self.tables.geolocation, geolocation_to_item(record), None)
                .await
        })
    }

    fn find<'a>(
        &'a self,
        county: &'a str,
        town: &'a str,
    ) -> StoreFuture<'a, Option<GeolocationRecord>> {
        Box::pin(async move {
            let result = self
                .client
                .get_item()
                .table_name(&self.tables.geolocation)
                .key("county", AttributeValue::S(county.to_string()))
                .key("town", AttributeValue::S(town.to_string()))
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            result.item.as_ref().map(parse_geolocation).transpose()
        })
    }

    fn counties(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(async move {
            let items = self.scan_all(&self.tables.geolocation, None, None).await?;
            let counties: BTreeSet<String> = items
                .iter()
                .map(|item| string_attr(item, "county"))
                .collect::<Result<_, _>>()?;
            Ok(counties.into_iter().collect())
        })
    }

    fn towns<'a>(&'a self, county: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(self.query_towns(county))
    }
}

impl UserStore for DynamoDbRepository {
    fn insert<'a>(&'a self, user: &'a User) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            log::info!("Creating user {} in '{}'", user.id, self.tables.users);
            self.put(&self.tables.users, user_to_item(user), Some("attribute_not_exists(id)"))
                .await
        })
    }

    fn update<'a>(&'a self, user: &'a User) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            log::debug!("Updating user {}", user.id);
            self.put(&self.tables.users, user_to_item(user), None).await
        })
    }

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            let result = self
                .client
                .get_item()
                .table_name(&self.tables.users)
                .key("id", AttributeValue::S(id.to_string()))
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            result.item.as_ref().map(parse_user).transpose()
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.find_user_by("email", email))
    }

    fn find_by_phone<'a>(&'a self, phone_number: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.find_user_by("phone_number", phone_number))
    }

    fn find_by_verification_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.find_user_by("verification_token", token))
    }

    fn find_by_reset_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.find_user_by("reset_token", token))
    }
}

fn number(value: f64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn insert_optional(item: &mut Item, key: &str, value: Option<String>) {
    if let Some(value) = value {
        item.insert(key.to_string(), AttributeValue::S(value));
    }
}

fn string_attr(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn optional_string_attr(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

fn number_attr(item: &Item, key: &str) -> Result<f64, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<f64>().ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn uuid_attr(item: &Item, key: &str) -> Result<Uuid, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn optional_time_attr(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn time_attr(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    optional_time_attr(item, key)
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn point_attr(item: &Item) -> Result<GeoPoint, RepositoryError> {
    GeoPoint::new(number_attr(item, "latitude")?, number_attr(item, "longitude")?)
        .map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

fn geojson_attr(point: &GeoPoint) -> AttributeValue {
    let mut location = HashMap::new();
    location.insert("type".to_string(), AttributeValue::S("Point".to_string()));
    location.insert(
        "coordinates".to_string(),
        AttributeValue::L(vec![number(point.longitude), number(point.latitude)]),
    );
    AttributeValue::M(location)
}

fn provider_to_item(record: &ProviderRecord) -> Item {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(record.id.to_string()));
    item.insert("kind".to_string(), AttributeValue::S(record.kind().to_string()));
    item.insert("county".to_string(), AttributeValue::S(record.county.clone()));
    item.insert("town".to_string(), AttributeValue::S(record.town.clone()));
    item.insert("contact".to_string(), AttributeValue::S(record.contact.clone()));
    item.insert("latitude".to_string(), number(record.location.latitude));
    item.insert("longitude".to_string(), number(record.location.longitude));
    item.insert("location".to_string(), geojson_attr(&record.location));
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(record.created_at.to_rfc3339()),
    );

    match &record.profile {
        ProviderProfile::Agrovet { name } => {
            item.insert("name".to_string(), AttributeValue::S(name.clone()));
        }
        ProviderProfile::ExtensionWorker {
            first_name,
            last_name,
            services,
        } => {
            item.insert("first_name".to_string(), AttributeValue::S(first_name.clone()));
            item.insert("last_name".to_string(), AttributeValue::S(last_name.clone()));
            item.insert(
                "services".to_string(),
                AttributeValue::L(services.iter().cloned().map(AttributeValue::S).collect()),
            );
        }
    }
    item
}

fn parse_provider(kind: ProviderKind, item: &Item) -> Result<ProviderRecord, RepositoryError> {
    let profile = match kind {
        ProviderKind::Agrovet => ProviderProfile::Agrovet {
            name: string_attr(item, "name")?,
        },
        ProviderKind::ExtensionWorker => ProviderProfile::ExtensionWorker {
            first_name: string_attr(item, "first_name")?,
            last_name: string_attr(item, "last_name")?,
            services: item
                .get("services")
                .and_then(|v| v.as_l().ok())
                .map(|list| {
                    list.iter()
                        .filter_map(|v| v.as_s().ok().cloned())
                        .collect()
                })
                .unwrap_or_default(),
        },
    };

    Ok(ProviderRecord {
        id: uuid_attr(item, "id")?,
        county: string_attr(item, "county")?,
        town: string_attr(item, "town")?,
        location: point_attr(item)?,
        contact: string_attr(item, "contact")?,
        profile,
        created_at: optional_time_attr(item, "created_at").unwrap_or_else(Utc::now),
    })
}

fn geolocation_to_item(record: &GeolocationRecord) -> Item {
    let mut item = HashMap::new();
    item.insert("county".to_string(), AttributeValue::S(record.county.clone()));
    item.insert("town".to_string(), AttributeValue::S(record.town.clone()));
    item.insert("latitude".to_string(), number(record.location.latitude));
    item.insert("longitude".to_string(), number(record.location.longitude));
    item.insert("location".to_string(), geojson_attr(&record.location));
    item
}

fn parse_geolocation(item: &Item) -> Result<GeolocationRecord, RepositoryError> {
    Ok(GeolocationRecord {
        county: string_attr(item, "county")?,
        town: string_attr(item, "town")?,
        location: point_attr(item)?,
    })
}

fn prediction_to_item(record: &PredictionRecord) -> Result<Item, RepositoryError> {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(record.id.to_string()));
    item.insert("filename".to_string(), AttributeValue::S(record.filename.clone()));
    item.insert("stored_as".to_string(), AttributeValue::S(record.stored_as.clone()));
    item.insert("disease".to_string(), AttributeValue::S(record.disease.clone()));
    item.insert("confidence".to_string(), number(record.confidence));
    if let Some(latitude) = record.latitude {
        item.insert("latitude".to_string(), number(latitude));
    }
    if let Some(longitude) = record.longitude {
        item.insert("longitude".to_string(), number(longitude));
    }
    item.insert("treatment".to_string(), AttributeValue::S(record.treatment.clone()));
    item.insert(
        "nearby_agrovets".to_string(),
        AttributeValue::S(serde_json::to_string(&record.nearby_agrovets)?),
    );
    item.insert(
        "nearby_extension_workers".to_string(),
        AttributeValue::S(serde_json::to_string(&record.nearby_extension_workers)?),
    );
    item.insert(
        "timestamp".to_string(),
        AttributeValue::S(record.timestamp.to_rfc3339()),
    );
    Ok(item)
}

fn user_to_item(user: &User) -> Item {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(user.id.to_string()));
    item.insert("first_name".to_string(), AttributeValue::S(user.first_name.clone()));
    item.insert("last_name".to_string(), AttributeValue::S(user.last_name.clone()));
    item.insert("username".to_string(), AttributeValue::S(user.username.clone()));
    insert_optional(&mut item, "email", user.email.clone());
    insert_optional(&mut item, "phone_number", user.phone_number.clone());
    insert_optional(&mut item, "password_hash", user.password_hash.clone());
    item.insert("is_verified".to_string(), AttributeValue::Bool(user.is_verified));
    insert_optional(&mut item, "verification_token", user.verification_token.clone());
    insert_optional(&mut item, "token_expiry", user.token_expiry.map(|t| t.to_rfc3339()));
    insert_optional(&mut item, "reset_token", user.reset_token.clone());
    insert_optional(&mut item, "reset_expiry", user.reset_expiry.map(|t| t.to_rfc3339()));
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(user.created_at.to_rfc3339()),
    );
    insert_optional(&mut item, "last_login", user.last_login.map(|t| t.to_rfc3339()));
    item
}

fn parse_user(item: &Item) -> Result<User, RepositoryError> {
    Ok(User {
        id: uuid_attr(item, "id")?,
        first_name: string_attr(item, "first_name")?,
        last_name: string_attr(item, "last_name")?,
        username: string_attr(item, "username")?,
        email: optional_string_attr(item, "email"),
        phone_number: optional_string_attr(item, "phone_number"),
        password_hash: optional_string_attr(item, "password_hash"),
        is_verified: item
            .get("is_verified")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        verification_token: optional_string_attr(item, "verification_token"),
        token_expiry: optional_time_attr(item, "token_expiry"),
        reset_token: optional_string_attr(item, "reset_token"),
        reset_expiry: optional_time_attr(item, "reset_expiry"),
        created_at: time_attr(item, "created_at")?,
        last_login: optional_time_attr(item, "last_login"),
    })
}
