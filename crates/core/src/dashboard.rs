use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::projector::OrderDisplay;
use crate::types::{AppointmentStatus, Client, ClientType, Product, ProductCategory};

/// Calendar month in the business timezone, written as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportMonth {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("month must be formatted as YYYY-MM (got {0})")]
pub struct ReportMonthError(String);

impl ReportMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month that contains `at` once converted to `tz`.
    pub fn containing(at: DateTime<Utc>, tz: Tz) -> Self {
        let local = at.with_timezone(&tz);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    fn includes(self, at: DateTime<Utc>, tz: Tz) -> bool {
        Self::containing(at, tz) == self
    }
}

impl fmt::Display for ReportMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportMonth {
    type Err = ReportMonthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ReportMonthError(value.to_string());
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for ReportMonth {
    type Error = ReportMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportMonth> for String {
    fn from(value: ReportMonth) -> Self {
        value.to_string()
    }
}

/// Number of active orders listed in the upcoming panel.
pub const UPCOMING_LIMIT: usize = 7;

/// One slice of a breakdown chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSlice {
    pub name: String,
    pub value: usize,
}

/// Headline numbers for the dashboard.
///
/// Scheduled/unscheduled counts are global; revenue and breakdowns only
/// consider orders completed inside the selected month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub month: ReportMonth,
    pub previous_month: ReportMonth,
    pub next_month: ReportMonth,
    pub total_clients: usize,
    pub scheduled_orders: usize,
    pub unscheduled_orders: usize,
    pub revenue_month: Decimal,
    pub completed_month: usize,
    pub by_client_type: Vec<ChartSlice>,
    pub by_product_type: Vec<ChartSlice>,
    /// Active orders, soonest first, undated ones last.
    pub upcoming: Vec<OrderDisplay>,
}

impl DashboardStats {
    pub fn compute(
        clients: &[Client],
        products: &[Product],
        orders: &[OrderDisplay],
        month: ReportMonth,
        tz: Tz,
    ) -> Self {
        let month_orders: Vec<&OrderDisplay> = orders
            .iter()
            .filter(|order| order.status() == AppointmentStatus::Completed)
            .filter(|order| {
                order
                    .appointment
                    .date
                    .is_some_and(|date| month.includes(date, tz))
            })
            .collect();

        let scheduled_orders = count_status(orders, AppointmentStatus::Scheduled);
        let unscheduled_orders = count_status(orders, AppointmentStatus::Pending);
        let revenue_month = month_orders
            .iter()
            .map(|order| order.product_price)
            .sum::<Decimal>();

        let (mut organizations, mut individuals) = (0, 0);
        for order in &month_orders {
            let kind = clients
                .iter()
                .find(|client| client.id == order.appointment.client_id)
                .map(|client| client.kind);
            match kind {
                Some(ClientType::Organization) => organizations += 1,
                Some(ClientType::Individual) => individuals += 1,
                None => {}
            }
        }
        let by_client_type = [
            (ClientType::Organization, organizations),
            (ClientType::Individual, individuals),
        ]
        .into_iter()
        .filter(|(_, value)| *value > 0)
        .map(|(kind, value)| ChartSlice {
            name: kind.label().to_string(),
            value,
        })
        .collect();

        let mut categories: Vec<(ProductCategory, usize)> = Vec::new();
        for order in &month_orders {
            let Some(product) = products
                .iter()
                .find(|product| product.id == order.appointment.product_id)
            else {
                continue;
            };
            match categories
                .iter_mut()
                .find(|(category, _)| *category == product.category)
            {
                Some((_, count)) => *count += 1,
                None => categories.push((product.category, 1)),
            }
        }
        let by_product_type = categories
            .into_iter()
            .map(|(category, value)| ChartSlice {
                name: category.label().to_string(),
                value,
            })
            .collect();

        Self {
            month,
            previous_month: month.previous(),
            next_month: month.next(),
            total_clients: clients.len(),
            scheduled_orders,
            unscheduled_orders,
            revenue_month,
            completed_month: month_orders.len(),
            by_client_type,
            by_product_type,
            upcoming: upcoming(orders),
        }
    }
}

fn upcoming(orders: &[OrderDisplay]) -> Vec<OrderDisplay> {
    let mut active: Vec<OrderDisplay> = orders
        .iter()
        .filter(|order| order.status().is_active())
        .cloned()
        .collect();
    active.sort_by(|a, b| match (a.appointment.date, b.appointment.date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    active.truncate(UPCOMING_LIMIT);
    active
}

fn count_status(orders: &[OrderDisplay], status: AppointmentStatus) -> usize {
    orders.iter().filter(|order| order.status() == status).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::{OrderSources, Projector};
    use crate::types::Appointment;
    use chrono::TimeZone;

    fn client(id: &str, kind: ClientType) -> Client {
        Client {
            id: id.to_string(),
            name: format!("client {id}"),
            document: String::new(),
            email: String::new(),
            phone: String::new(),
            kind,
        }
    }

    fn product(id: &str, cents: i64, category: ProductCategory) -> Product {
        Product {
            id: id.to_string(),
            name: format!("product {id}"),
            description: String::new(),
            price: Decimal::new(cents, 2),
            validity_months: 12,
            category,
        }
    }

    fn appointment(
        id: &str,
        client_id: &str,
        product_id: &str,
        date: Option<DateTime<Utc>>,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: id.to_string(),
            client_id: client_id.to_string(),
            product_id: product_id.to_string(),
            ac_id: "ac-1".to_string(),
            date,
            status,
            notes: None,
        }
    }

    #[test]
    fn report_month_parses_and_steps() {
        let month: ReportMonth = "2024-12".parse().expect("valid month");
        assert_eq!(month.next().to_string(), "2025-01");
        assert_eq!(month.previous().to_string(), "2024-11");
        assert!("2024-13".parse::<ReportMonth>().is_err());
        assert!("december".parse::<ReportMonth>().is_err());
    }

    #[test]
    fn month_boundaries_follow_business_timezone() {
        let late_night = Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap();
        let month = ReportMonth::containing(late_night, chrono_tz::America::Sao_Paulo);
        assert_eq!(month.to_string(), "2024-05");
    }

    #[test]
    fn stats_only_count_completed_orders_in_month() {
        let clients = vec![
            client("c-pj", ClientType::Organization),
            client("c-pf", ClientType::Individual),
        ];
        let products = vec![
            product("p-a1", 25000, ProductCategory::A1),
            product("p-cloud", 15000, ProductCategory::Cloud),
        ];
        let may = |day| Some(Utc.with_ymd_and_hms(2024, 5, day, 15, 0, 0).unwrap());
        let june = Some(Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap());
        let appointments = vec![
            appointment("1", "c-pj", "p-a1", may(2), AppointmentStatus::Completed),
            appointment("2", "c-pf", "p-cloud", may(3), AppointmentStatus::Completed),
            appointment("3", "c-pj", "p-a1", may(4), AppointmentStatus::Cancelled),
            appointment("4", "c-pj", "p-a1", june, AppointmentStatus::Completed),
            appointment("5", "c-pf", "p-a1", may(20), AppointmentStatus::Scheduled),
            appointment("6", "c-pf", "p-a1", None, AppointmentStatus::Pending),
            appointment("7", "gone", "p-a1", may(5), AppointmentStatus::Completed),
        ];
        let orders = Projector::orders(
            &appointments,
            OrderSources {
                clients: &clients,
                products: &products,
                authorities: &[],
            },
        );

        let stats = DashboardStats::compute(
            &clients,
            &products,
            &orders,
            ReportMonth::new(2024, 5).unwrap(),
            chrono_tz::America::Sao_Paulo,
        );

        assert_eq!(stats.total_clients, 2);
        assert_eq!(stats.scheduled_orders, 1);
        assert_eq!(stats.unscheduled_orders, 1);
        assert_eq!(stats.completed_month, 3);
        assert_eq!(stats.revenue_month, Decimal::new(65000, 2));
        assert_eq!(
            stats.by_client_type,
            vec![
                ChartSlice {
                    name: "Pessoa Jurídica (CNPJ)".to_string(),
                    value: 1
                },
                ChartSlice {
                    name: "Pessoa Física (CPF)".to_string(),
                    value: 1
                },
            ]
        );
        assert_eq!(
            stats.by_product_type,
            vec![
                ChartSlice {
                    name: "Certificado A1".to_string(),
                    value: 2
                },
                ChartSlice {
                    name: "Nuvem".to_string(),
                    value: 1
                },
            ]
        );
    }

    #[test]
    fn empty_breakdowns_are_omitted() {
        let stats = DashboardStats::compute(
            &[],
            &[],
            &[],
            ReportMonth::new(2024, 1).unwrap(),
            chrono_tz::UTC,
        );
        assert!(stats.by_client_type.is_empty());
        assert!(stats.by_product_type.is_empty());
        assert!(stats.upcoming.is_empty());
        assert_eq!(stats.revenue_month, Decimal::ZERO);
        assert_eq!(stats.previous_month.to_string(), "2023-12");
        assert_eq!(stats.next_month.to_string(), "2024-02");
    }

    #[test]
    fn upcoming_lists_dated_orders_first_and_stops_at_limit() {
        let day = |day| Some(Utc.with_ymd_and_hms(2024, 5, day, 15, 0, 0).unwrap());
        let mut appointments = vec![
            appointment("undated", "c", "p", None, AppointmentStatus::Pending),
            appointment("late", "c", "p", day(28), AppointmentStatus::Scheduled),
            appointment("done", "c", "p", day(1), AppointmentStatus::Completed),
            appointment("early", "c", "p", day(2), AppointmentStatus::Scheduled),
            appointment("dropped", "c", "p", day(3), AppointmentStatus::Cancelled),
        ];
        for n in 10..16 {
            appointments.push(appointment(
                &format!("mid-{n}"),
                "c",
                "p",
                day(n),
                AppointmentStatus::Scheduled,
            ));
        }
        let orders = Projector::orders(
            &appointments,
            OrderSources {
                clients: &[],
                products: &[],
                authorities: &[],
            },
        );

        let stats = DashboardStats::compute(
            &[],
            &[],
            &orders,
            ReportMonth::new(2024, 5).unwrap(),
            chrono_tz::UTC,
        );

        let ids: Vec<&str> = stats
            .upcoming
            .iter()
            .map(|order| order.appointment.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["early", "mid-10", "mid-11", "mid-12", "mid-13", "mid-14", "mid-15"]
        );
    }

    #[test]
    fn upcoming_keeps_undated_orders_after_dated_ones() {
        let dated = Some(Utc.with_ymd_and_hms(2024, 5, 20, 15, 0, 0).unwrap());
        let orders = Projector::orders(
            &[
                appointment("pending", "c", "p", None, AppointmentStatus::Pending),
                appointment("booked", "c", "p", dated, AppointmentStatus::Scheduled),
            ],
            OrderSources {
                clients: &[],
                products: &[],
                authorities: &[],
            },
        );
        let stats = DashboardStats::compute(
            &[],
            &[],
            &orders,
            ReportMonth::new(2024, 5).unwrap(),
            chrono_tz::UTC,
        );
        let ids: Vec<&str> = stats
            .upcoming
            .iter()
            .map(|order| order.appointment.id.as_str())
            .collect();
        assert_eq!(ids, vec!["booked", "pending"]);
    }
}
