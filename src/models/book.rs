//! Book (catalog entry) model and related types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Physical cover of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Cover {
    #[serde(rename = "HARD")]
    Hardcover,
    #[serde(rename = "SOFT")]
    Softcover,
}

impl Cover {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cover::Hardcover => "HARD",
            Cover::Softcover => "SOFT",
        }
    }
}

impl std::fmt::Display for Cover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Cover {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HARD" => Ok(Cover::Hardcover),
            "SOFT" => Ok(Cover::Softcover),
            _ => Err(format!("Invalid cover: {}", s)),
        }
    }
}

// Stored as VARCHAR(4)
impl sqlx::Type<Postgres> for Cover {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Cover {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Cover {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub cover: Cover,
    /// Copies available to lend
    pub inventory: i32,
    /// Static per-day rate, serialized as a decimal string
    #[schema(value_type = String, example = "4.00")]
    pub daily_fee: Decimal,
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub cover: Cover,
    pub inventory: i32,
}

impl From<Book> for BookShort {
    fn from(book: Book) -> Self {
        BookShort {
            id: book.id,
            title: book.title,
            author: book.author,
            cover: book.cover,
            inventory: book.inventory,
        }
    }
}

/// Fractional digits of a stored fee
pub const FEE_SCALE: u32 = 2;

/// Largest fee representable as NUMERIC(6, 2)
const MAX_DAILY_FEE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

fn validate_daily_fee(fee: &Decimal) -> Result<(), ValidationError> {
    if fee.is_sign_negative() && !fee.is_zero() {
        return Err(ValidationError::new("daily_fee_negative")
            .with_message("Daily fee must be greater than or equal to 0".into()));
    }
    if fee.normalize().scale() > 2 {
        return Err(ValidationError::new("daily_fee_precision")
            .with_message("Daily fee must have at most 2 decimal places".into()));
    }
    if *fee > MAX_DAILY_FEE {
        return Err(ValidationError::new("daily_fee_too_large")
            .with_message("Daily fee must have at most 6 digits".into()));
    }
    Ok(())
}

/// Create or replace (PUT) book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: String,
    pub cover: Cover,
    #[validate(range(min = 0, message = "Inventory must be greater than or equal to 0"))]
    pub inventory: i32,
    #[validate(custom(function = "validate_daily_fee"))]
    #[schema(value_type = String, example = "4.00")]
    pub daily_fee: Decimal,
}

impl BookInput {
    /// Fee with exactly two fractional digits, as NUMERIC(6, 2) stores it
    pub fn normalized(mut self) -> Self {
        self.daily_fee.rescale(FEE_SCALE);
        self
    }
}

/// Partial update (PATCH) book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BookPatch {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: Option<String>,
    pub cover: Option<Cover>,
    #[validate(range(min = 0, message = "Inventory must be greater than or equal to 0"))]
    pub inventory: Option<i32>,
    #[validate(custom(function = "validate_daily_fee"))]
    #[schema(value_type = Option<String>, example = "4.00")]
    pub daily_fee: Option<Decimal>,
}

impl BookPatch {
    /// Merge the supplied fields into an existing record
    pub fn apply(self, book: &Book) -> BookInput {
        BookInput {
            title: self.title.unwrap_or_else(|| book.title.clone()),
            author: self.author.unwrap_or_else(|| book.author.clone()),
            cover: self.cover.unwrap_or(book.cover),
            inventory: self.inventory.unwrap_or(book.inventory),
            daily_fee: self.daily_fee.unwrap_or(book.daily_fee),
        }
    }
}
