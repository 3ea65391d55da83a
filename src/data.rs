//! Opinionated, date-range-centric data pulls.
//!
//! [`DataService`] is a selection of common reads with a simplified surface:
//! each method assembles the query parameters one documented endpoint
//! expects, hands them to [`Endpoint`], and returns the records as-is. The
//! heavy machinery (auth, paging, rate limiting) lives in the client and
//! endpoint layers; nothing here retries or recovers.

use chrono_tz::Tz;
use serde_json::{json, Value};
use ureq::{http::Method, Agent};

use crate::client::STContext;
use crate::dates::{self, DateInput};
use crate::endpoint::{Endpoint, QueryOptions};
use crate::error::{APIError, APIResult};

/// API version used by every operation except the telecom calls endpoint.
pub const DEFAULT_API_VERSION: u8 = 2;

const CALLS_API_VERSION: u8 = 3;

const DEFAULT_JOB_STATUSES: &[&str] = &["Completed", "Scheduled", "InProgress", "Dispatched"];
const DEFAULT_APPOINTMENT_STATUSES: &[&str] = &["Scheduled", "Dispatched", "Working", "Done"];

/// The semantic date field a range filter applies to.
///
/// The API names its bounds `{field}OnOrAfter` / `{field}Before`; the lower
/// bound is inclusive and the upper bound exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateField {
    #[default]
    Completed,
    Created,
    Started,
    Sold,
    Modified,
    Paid,
    Invoiced,
}

impl DateField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DateField::Completed => "completed",
            DateField::Created => "created",
            DateField::Started => "started",
            DateField::Sold => "sold",
            DateField::Modified => "modified",
            DateField::Paid => "paid",
            DateField::Invoiced => "invoiced",
        }
    }
}

/// Wire value for the API's `active` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveFilter {
    #[default]
    True,
    False,
    Any,
}

impl ActiveFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActiveFilter::True => "True",
            ActiveFilter::False => "False",
            ActiveFilter::Any => "Any",
        }
    }
}

/// Patch semantics for external-data updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchMode {
    #[default]
    Merge,
    Replace,
}

impl PatchMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatchMode::Merge => "Merge",
            PatchMode::Replace => "Replace",
        }
    }
}

fn options_from<const N: usize>(pairs: [(&str, String); N]) -> QueryOptions {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Primary entry point for executing data pulls.
///
/// A `DataService` binds a connection context, an HTTP agent, and the
/// account's resolved time zone, and exposes common pulls keyed by a date
/// range. Date arguments accept calendar dates, naive datetimes (interpreted
/// in the account time zone), UTC instants, or pre-formatted strings.
///
/// # Examples
///
/// ```no_run
/// use oxititan::{DataService, Environment, STContext};
/// use chrono::NaiveDate;
/// use ureq::Agent;
///
/// let client = Agent::new_with_defaults();
/// let context = STContext::new_from_env(Environment::PRODUCTION, &client).unwrap();
/// let data_service = DataService::new(&context, &client).unwrap();
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
/// let invoices = data_service.invoices_between(start, end).unwrap();
/// ```
pub struct DataService<'a> {
    context: &'a STContext,
    client: &'a Agent,
    timezone: Tz,
}

impl<'a> DataService<'a> {
    /// Binds the facade to a connection context, resolving the account's
    /// configured time zone once.
    ///
    /// # Errors
    ///
    /// Fails if the configured time zone name is not a known IANA zone.
    pub fn new(context: &'a STContext, client: &'a Agent) -> APIResult<Self> {
        let timezone = dates::resolve_timezone(context.timezone_name.as_deref())?;
        Ok(Self {
            context,
            client,
            timezone,
        })
    }

    /// The time zone date filters are interpreted in.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn format_date(&self, date: impl Into<DateInput>) -> APIResult<String> {
        dates::to_api_format(&date.into(), self.timezone)
    }

    fn endpoint(&self, folder: &str, endpoint: &str) -> Endpoint<'_> {
        Endpoint::new(folder, endpoint, DEFAULT_API_VERSION, self.context)
    }

    /// Retrieves data from the given folder and endpoint.
    ///
    /// Calling with empty or absent options logs a warning and fetches the
    /// entire collection anyway.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use oxititan::{DataService, QueryOptions};
    /// # fn example(data_service: &DataService) -> oxititan::APIResult<()> {
    /// let mut options = QueryOptions::new();
    /// options.insert("createdOnOrAfter".to_string(), "2025-10-20T20:00:00Z".to_string());
    /// let new_invoices = data_service.fetch("accounting", "invoices", Some(options))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn fetch(
        &self,
        folder: &str,
        endpoint: &str,
        options: Option<QueryOptions>,
    ) -> APIResult<Vec<Value>> {
        self.fetch_with_version(folder, endpoint, options, DEFAULT_API_VERSION)
    }

    /// [`DataService::fetch`] against a specific API version.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn fetch_with_version(
        &self,
        folder: &str,
        endpoint: &str,
        options: Option<QueryOptions>,
        version: u8,
    ) -> APIResult<Vec<Value>> {
        let options = options.unwrap_or_default();
        if options.is_empty() {
            log::warn!("no filter options given, fetching ALL of {folder}/{endpoint}");
        }
        Endpoint::new(folder, endpoint, version, self.context).get_all(self.client, &options)
    }

    /// Retrieves data from the given folder and endpoint between two dates.
    ///
    /// The bounds land in `{field}OnOrAfter` (inclusive) and `{field}Before`
    /// (exclusive), overwriting caller-supplied values for those keys.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn fetch_between(
        &self,
        folder: &str,
        endpoint: &str,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        field: DateField,
        options: Option<QueryOptions>,
    ) -> APIResult<Vec<Value>> {
        self.fetch_between_with_version(folder, endpoint, start, end, field, options, DEFAULT_API_VERSION)
    }

    /// [`DataService::fetch_between`] against a specific API version.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    #[allow(clippy::too_many_arguments)]
    pub fn fetch_between_with_version(
        &self,
        folder: &str,
        endpoint: &str,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        field: DateField,
        options: Option<QueryOptions>,
        version: u8,
    ) -> APIResult<Vec<Value>> {
        let mut options = options.unwrap_or_default();
        options.insert(
            format!("{}OnOrAfter", field.as_str()),
            self.format_date(start)?,
        );
        options.insert(format!("{}Before", field.as_str()), self.format_date(end)?);
        self.fetch_with_version(folder, endpoint, Some(options), version)
    }

    /// Retrieves all jobs completed between the start and end date.
    ///
    /// One request is issued per job status and the results concatenated in
    /// status order. `None` selects the common working statuses. A failure
    /// partway through the statuses aborts the whole call.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn jobs_completed_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        job_status: Option<&[&str]>,
        app_guid: Option<&str>,
    ) -> APIResult<Vec<Value>> {
        let start = self.format_date(start)?;
        let end = self.format_date(end)?;

        let mut data = Vec::new();
        for status in job_status.unwrap_or(DEFAULT_JOB_STATUSES) {
            let mut options = options_from([
                ("jobStatus", (*status).to_string()),
                ("completedOnOrAfter", start.clone()),
                ("completedBefore", end.clone()),
            ]);
            if let Some(guid) = app_guid {
                options.insert("externalDataApplicationGuid".to_string(), guid.to_string());
            }
            data.extend(self.endpoint("jpm", "jobs").get_all(self.client, &options)?);
        }

        Ok(data)
    }

    /// Retrieves all jobs created between the start and end date, regardless
    /// of their current status.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn jobs_created_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        app_guid: Option<&str>,
    ) -> APIResult<Vec<Value>> {
        let mut options = options_from([
            ("createdOnOrAfter", self.format_date(start)?),
            ("createdBefore", self.format_date(end)?),
        ]);
        if let Some(guid) = app_guid {
            options.insert("externalDataApplicationGuid".to_string(), guid.to_string());
        }
        self.endpoint("jpm", "jobs").get_all(self.client, &options)
    }

    /// Retrieves all jobs modified between the start and end date.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn jobs_modified_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        app_guid: Option<&str>,
    ) -> APIResult<Vec<Value>> {
        let mut options = options_from([
            ("modifiedOnOrAfter", self.format_date(start)?),
            ("modifiedBefore", self.format_date(end)?),
        ]);
        if let Some(guid) = app_guid {
            options.insert("externalDataApplicationGuid".to_string(), guid.to_string());
        }
        self.endpoint("jpm", "jobs").get_all(self.client, &options)
    }

    /// Retrieves all appointments starting between the start and end date,
    /// one request per appointment status, concatenated in status order.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn appointments_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        appointment_status: Option<&[&str]>,
    ) -> APIResult<Vec<Value>> {
        let start = self.format_date(start)?;
        let end = self.format_date(end)?;

        let mut data = Vec::new();
        for status in appointment_status.unwrap_or(DEFAULT_APPOINTMENT_STATUSES) {
            let options = options_from([
                ("status", (*status).to_string()),
                ("startsOnOrAfter", start.clone()),
                ("startsBefore", end.clone()),
            ]);
            data.extend(
                self.endpoint("jpm", "appointments")
                    .get_all(self.client, &options)?,
            );
        }

        Ok(data)
    }

    /// Retrieves all active estimates sold between the start and end date.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn sold_estimates_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<Vec<Value>> {
        let options = options_from([
            ("active", ActiveFilter::True.as_str().to_string()),
            ("soldAfter", self.format_date(start)?),
            ("soldBefore", self.format_date(end)?),
        ]);
        self.endpoint("sales", "estimates")
            .get_all(self.client, &options)
    }

    /// Total sales dollar amount between the start and end date: the sum of
    /// `total` over every line item of every sold estimate in the range.
    ///
    /// # Errors
    ///
    /// Besides endpoint faults, fails with [`APIError::MissingField`] when a
    /// record has no `items` array or an item has no numeric `total`.
    pub fn total_sales_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<f64> {
        let data = self.sold_estimates_between(start, end)?;

        let mut sales = 0.0;
        for row in &data {
            let items = row
                .get("items")
                .and_then(Value::as_array)
                .ok_or(APIError::MissingField("items"))?;
            for sku in items {
                sales += sku
                    .get("total")
                    .and_then(Value::as_f64)
                    .ok_or(APIError::MissingField("total"))?;
            }
        }

        Ok(sales)
    }

    /// Retrieves all purchase orders created between the start and end date.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn purchase_orders_created_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<Vec<Value>> {
        let options = options_from([
            ("createdOnOrAfter", self.format_date(start)?),
            ("createdBefore", self.format_date(end)?),
        ]);
        self.endpoint("inventory", "purchase-orders")
            .get_all(self.client, &options)
    }

    /// Retrieves all calls created between the start and end date.
    ///
    /// The telecom calls endpoint is the one collection served from API
    /// version 3.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn calls_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<Vec<Value>> {
        let options = options_from([
            ("createdOnOrAfter", self.format_date(start)?),
            ("createdBefore", self.format_date(end)?),
        ]);
        Endpoint::new("telecom", "calls", CALLS_API_VERSION, self.context)
            .get_all(self.client, &options)
    }

    /// Retrieves all bookings created between the start and end date.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn bookings_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<Vec<Value>> {
        let options = options_from([
            ("createdOnOrAfter", self.format_date(start)?),
            ("createdBefore", self.format_date(end)?),
        ]);
        self.endpoint("crm", "bookings")
            .get_all(self.client, &options)
    }

    /// Retrieves all payments made between the start and end date.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn payments_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<Vec<Value>> {
        let options = options_from([
            ("paidOnAfter", self.format_date(start)?),
            ("paidOnBefore", self.format_date(end)?),
        ]);
        self.endpoint("accounting", "payments")
            .get_all(self.client, &options)
    }

    /// Retrieves all invoices issued between the start and end date.
    ///
    /// # Errors
    ///
    /// Propagates endpoint faults and date-conversion failures.
    pub fn invoices_between(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> APIResult<Vec<Value>> {
        let options = options_from([
            ("invoicedOnOrAfter", self.format_date(start)?),
            ("invoicedOnBefore", self.format_date(end)?),
        ]);
        self.endpoint("accounting", "invoices")
            .get_all(self.client, &options)
    }

    /// Retrieves the invoices with the given ids.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn invoices_by_id(&self, ids: &[i64]) -> APIResult<Vec<Value>> {
        let options = options_from([("ids", join_ids(ids))]);
        self.endpoint("accounting", "invoices")
            .get_all(self.client, &options)
    }

    /// Retrieves all estimates attached to the given job.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn estimates_by_job_id(&self, job_id: i64) -> APIResult<Vec<Value>> {
        let options = options_from([("jobId", job_id.to_string())]);
        self.endpoint("sales", "estimates")
            .get_all(self.client, &options)
    }

    /// Retrieves all appointment assignments on the given job.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn appointment_assignments_by_job_id(&self, job_id: i64) -> APIResult<Vec<Value>> {
        let options = options_from([("jobId", job_id.to_string())]);
        self.endpoint("dispatch", "appointment-assignments")
            .get_all(self.client, &options)
    }

    /// Retrieves the employee list. `None` shows only active employees.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn employees(&self, active: Option<ActiveFilter>) -> APIResult<Vec<Value>> {
        let options = options_from([("active", active.unwrap_or_default().as_str().to_string())]);
        self.endpoint("settings", "employees")
            .get_all(self.client, &options)
    }

    /// Retrieves the technician list. `None` shows only active technicians.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn technicians(&self, active: Option<ActiveFilter>) -> APIResult<Vec<Value>> {
        let options = options_from([("active", active.unwrap_or_default().as_str().to_string())]);
        self.endpoint("settings", "technicians")
            .get_all(self.client, &options)
    }

    /// Retrieves the technician with the given id.
    ///
    /// # Errors
    ///
    /// Fails with [`APIError::NoRecords`] when the id matches nothing.
    pub fn technician_by_id(&self, tech_id: i64) -> APIResult<Value> {
        let options = options_from([("ids", tech_id.to_string())]);
        self.endpoint("settings", "technicians")
            .get_all(self.client, &options)?
            .into_iter()
            .next()
            .ok_or_else(|| APIError::NoRecords("settings/technicians".to_string()))
    }

    /// Retrieves every technician, active or not.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn all_technicians(&self) -> APIResult<Vec<Value>> {
        self.endpoint("settings", "technicians")
            .get_all(self.client, &QueryOptions::new())
    }

    /// Retrieves the tag type list. `None` shows only active tag types.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn tag_types(&self, active: Option<ActiveFilter>) -> APIResult<Vec<Value>> {
        let options = options_from([("active", active.unwrap_or_default().as_str().to_string())]);
        self.endpoint("settings", "tag-types")
            .get_all(self.client, &options)
    }

    /// Retrieves every tag type, active or not.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn all_tag_types(&self) -> APIResult<Vec<Value>> {
        self.endpoint("settings", "tag-types")
            .get_all(self.client, &QueryOptions::new())
    }

    /// Retrieves the business unit list. `None` shows only active units.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn business_units(&self, active: Option<ActiveFilter>) -> APIResult<Vec<Value>> {
        let options = options_from([("active", active.unwrap_or_default().as_str().to_string())]);
        self.endpoint("settings", "business-units")
            .get_all(self.client, &options)
    }

    /// Retrieves the job type list. Unlike the other listings, `None` shows
    /// every job type, not just the active ones.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn job_types(&self, active: Option<ActiveFilter>) -> APIResult<Vec<Value>> {
        let options = options_from([(
            "active",
            active.unwrap_or(ActiveFilter::Any).as_str().to_string(),
        )]);
        self.endpoint("jpm", "job-types")
            .get_all(self.client, &options)
    }

    /// Retrieves all payments applied to the given invoices.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn payments_for_invoices(&self, invoice_ids: &[i64]) -> APIResult<Vec<Value>> {
        let options = options_from([("appliedToInvoiceIds", join_ids(invoice_ids))]);
        self.endpoint("accounting", "payments")
            .get_all(self.client, &options)
    }

    /// Retrieves a job attachment as its raw byte payload.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn attachment(&self, attach_id: i64) -> APIResult<Vec<u8>> {
        self.endpoint("forms", "jobs/attachment")
            .get_one_raw(self.client, attach_id)
    }

    /// Patches the external data a partner application has stored on a job.
    ///
    /// `None` merges the payload into the existing entries; pass
    /// [`PatchMode::Replace`] to overwrite them wholesale.
    ///
    /// # Errors
    ///
    /// Propagates any fault from the endpoint layer.
    pub fn patch_job_external_data(
        &self,
        job_id: i64,
        data_payload: &Value,
        external_guid: &str,
        patch_mode: Option<PatchMode>,
    ) -> APIResult<Value> {
        let payload = json!({
            "externalData": {
                "patchMode": patch_mode.unwrap_or_default().as_str(),
                "applicationGuid": external_guid,
                "externalData": data_payload,
            }
        });
        self.endpoint("jpm", "jobs")
            .update(self.client, job_id, &payload, Method::PATCH)
    }
}
