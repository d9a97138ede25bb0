use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn to_query(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Unassigned,
    Taken,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unassigned => "UNASSIGNED",
            OrderStatus::Taken => "TAKEN",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNASSIGNED" => Ok(OrderStatus::Unassigned),
            "TAKEN" => Ok(OrderStatus::Taken),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Order {
    pub id: i64,
    #[serde(skip)]
    pub origin: GeoPoint,
    #[serde(skip)]
    pub destination: GeoPoint,
    pub distance: u32,
    pub status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub distance: u32,
}
