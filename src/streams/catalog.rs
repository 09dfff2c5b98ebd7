//! The HubSpot stream catalog

use super::definition::{
    object_envelope, PaginationKind, PropertySource, StreamDefinition, StreamMetadata,
};
use crate::error::{Error, Result};
use crate::pagination::RecordSelector;
use crate::partition::{trailing_years, Context, ListRouter};
use crate::schema::{FieldType, ObjectSchema};
use crate::types::{JsonObject, SortOrder};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Object types whose property definitions feed the `properties` stream
pub const PROPERTY_OBJECT_TYPES: [&str; 14] = [
    "ticket",
    "deal",
    "contact",
    "company",
    "product",
    "line_item",
    "email",
    "postal_mail",
    "call",
    "meeting",
    "task",
    "communication",
    "note",
    "user",
];

/// Campaign asset types, one `campaign_assets` context each
pub const CAMPAIGN_ASSET_TYPES: [&str; 14] = [
    "AD_CAMPAIGN",
    "BLOG_POST",
    "SOCIAL_BROADCAST",
    "WEB_INTERACTIVE",
    "CTA",
    "EXTERNAL_WEB_URL",
    "FORM",
    "LANDING_PAGE",
    "MARKETING_EMAIL",
    "MARKETING_EVENT",
    "OBJECT_LIST",
    "SITE_PAGE",
    "AUTOMATION_PLATFORM_FLOW",
    "MARKETING_SMS",
];

const CAMPAIGN_PROPERTIES: [&str; 14] = [
    "hs_start_date",
    "hs_end_date",
    "hs_color_hex",
    "hs_notes",
    "hs_audience",
    "hs_goal",
    "hs_owner",
    "hs_currency_code",
    "hs_created_by_user_id",
    "hs_campaign_status",
    "hs_object_id",
    "hs_name",
    "hs_budget_items_sum_amount",
    "hs_spend_items_sum_amount",
];

const ASSET_METRICS: [&str; 20] = [
    "CLICKS",
    "OPEN",
    "SENT",
    "CONTACTS_FIRST_TOUCH",
    "CONTACTS_LAST_TOUCH",
    "SUBMISSIONS",
    "VIEWS",
    "FACEBOOK_CLICKS",
    "LINKEDIN_CLICKS",
    "TWITTER_CLICKS",
    "CONVERSION_RATE",
    "CUSTOMERS",
    "ATTENDEES",
    "CANCELLATIONS",
    "REGISTRATIONS",
    "CONTACTS",
    "CURRENTLY_ENROLLED",
    "STARTED",
    "DELIVERED",
    "UNIQUE_CLICKS",
];

/// Years of campaign reporting requested per campaign
const CAMPAIGN_REPORT_YEARS: u32 = 3;

/// Ordered set of stream definitions
#[derive(Debug, Clone)]
pub struct Catalog {
    streams: Vec<StreamDefinition>,
}

impl Catalog {
    /// Build a catalog from definitions, keeping their order
    pub fn new(streams: Vec<StreamDefinition>) -> Self {
        Self { streams }
    }

    /// Every HubSpot stream, in source order
    pub fn hubspot() -> Self {
        Self::new(vec![
            StreamDefinition::crm_object(
                "contacts",
                "/crm/v3/objects/contacts",
                "/crm/v3/objects/contacts/search",
                "lastmodifieddate",
            ),
            users(),
            owners(),
            pipelines(
                "ticket_pipelines",
                "/crm-pipelines/v1/pipelines/tickets",
                ticket_stage_metadata(),
            ),
            pipelines(
                "deal_pipelines",
                "/crm-pipelines/v1/pipelines/deals",
                deal_stage_metadata(),
            ),
            email_subscriptions(),
            properties(),
            StreamDefinition::crm_object(
                "companies",
                "/crm/v3/objects/companies",
                "/crm/v3/objects/companies/search",
                "hs_lastmodifieddate",
            ),
            StreamDefinition::crm_object(
                "deals",
                "/crm/v3/objects/deals",
                "/crm/v3/objects/deals/search",
                "hs_lastmodifieddate",
            ),
            fixed_object(
                "feedback_submissions",
                "/crm/v3/objects/feedback_submissions",
                &[
                    "city",
                    "createdDate",
                    "domain",
                    "hs_lastmodifieddate",
                    "industry",
                    "name",
                    "phone",
                    "state",
                ],
            ),
            fixed_object(
                "line_items",
                "/crm/v3/objects/line_items",
                &[
                    "createdate",
                    "hs_lastmodifieddate",
                    "hs_product_id",
                    "hs_recurring_billing_period",
                    "name",
                    "price",
                    "quantity",
                    "recurringbillingfrequency",
                ],
            ),
            fixed_object(
                "products",
                "/crm/v3/objects/products",
                &[
                    "createdate",
                    "description",
                    "hs_cost_of_goods_sold",
                    "hs_lastmodifieddate",
                    "hs_recurring_billing_period",
                    "hs_sku",
                    "name",
                    "price",
                ],
            ),
            fixed_object(
                "tickets",
                "/crm/v3/objects/tickets",
                &[
                    "createdate",
                    "hs_lastmodifieddate",
                    "hs_pipeline",
                    "hs_pipeline_stage",
                    "hs_ticket_priority",
                    "hubspot_owner_id",
                    "subject",
                ],
            ),
            fixed_object(
                "quotes",
                "/crm/v3/objects/quotes",
                &[
                    "hs_createdate",
                    "hs_expiration_date",
                    "hs_quote_amount",
                    "hs_quote_number",
                    "hs_status",
                    "hs_terms",
                    "hs_title",
                    "hubspot_owner_id",
                ],
            ),
            fixed_object(
                "goals",
                "/crm/v3/objects/goal_targets",
                &[
                    "createdate",
                    "hs_created_by_user_id",
                    "hs_end_datetime",
                    "hs_goal_name",
                    "hs_lastmodifieddate",
                    "hs_start_datetime",
                    "hs_target_amount",
                ],
            ),
            crm_activity("calls", "/crm/v3/objects/calls", "/crm/v3/objects/calls/search"),
            crm_activity(
                "communications",
                "/crm/v3/objects/communications",
                "/crm/v3/objects/communications/search",
            ),
            fixed_object(
                "emails",
                "/crm/v3/objects/emails",
                &[
                    "createdate",
                    "hs_email_direction",
                    "hs_email_sender_email",
                    "hs_email_sender_firstname",
                    "hs_email_sender_lastname",
                    "hs_email_status",
                    "hs_email_subject",
                    "hs_email_text",
                    "hs_email_to_email",
                    "hs_email_to_firstname",
                    "hs_email_to_lastname",
                    "hs_lastmodifieddate",
                    "hs_timestamp",
                    "hubspot_owner_id",
                ],
            ),
            crm_activity("meetings", "/crm/v3/objects/meetings", "/crm/v3/objects/meetings/search"),
            crm_activity("notes", "/crm/v3/objects/notes", "/crm/v3/objects/notes/search"),
            crm_activity(
                "postal_mail",
                "/crm/v3/objects/postal_mail",
                "/crm/v3/objects/postal_mail/search",
            ),
            crm_activity("tasks", "/crm/v3/objects/tasks", "/crm/v3/objects/tasks/search"),
            forms(),
            form_submissions(),
            campaigns(),
            campaign_revenue(),
            campaign_metrics(),
            campaign_assets(),
        ])
    }

    /// Definitions in catalog order
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// Stream names in catalog order
    pub fn names(&self) -> Vec<&'static str> {
        self.streams.iter().map(|s| s.name).collect()
    }

    pub fn find(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Like [`find`](Self::find), failing with `StreamNotFound`
    pub fn get(&self, name: &str) -> Result<&StreamDefinition> {
        self.find(name).ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
    }

    /// Schema and key metadata for every stream
    pub fn list_streams(&self, flatten_depth: Option<usize>) -> Vec<StreamMetadata> {
        self.streams
            .iter()
            .map(|s| s.metadata(flatten_depth))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::hubspot()
    }
}

// ============================================================================
// CRM
// ============================================================================

fn crm_activity(name: &'static str, path: &'static str, search: &'static str) -> StreamDefinition {
    StreamDefinition::crm_object(name, path, search, "hs_lastmodifieddate")
}

/// Full-table CRM object with a known property list
fn fixed_object(name: &'static str, path: &'static str, fields: &[&str]) -> StreamDefinition {
    let properties = ObjectSchema::new(fields.iter().map(|f| (*f, FieldType::String)));
    StreamDefinition::new(
        name,
        path,
        object_envelope(FieldType::Object(properties), FieldType::String),
    )
}

fn users() -> StreamDefinition {
    StreamDefinition::new(
        "users",
        "/settings/v3/users",
        ObjectSchema::new([
            ("id", FieldType::String),
            ("email", FieldType::String),
            ("roleIds", FieldType::array(FieldType::String)),
            ("primaryTeamId", FieldType::String),
            ("secondaryTeamIds", FieldType::array(FieldType::String)),
            ("superAdmin", FieldType::Boolean),
        ]),
    )
}

fn owners() -> StreamDefinition {
    StreamDefinition::new(
        "owners",
        "/crm/v3/owners",
        ObjectSchema::new([
            ("id", FieldType::String),
            ("email", FieldType::String),
            ("firstName", FieldType::String),
            ("lastName", FieldType::String),
            ("userId", FieldType::Integer),
            ("createdAt", FieldType::DateTime),
            ("updatedAt", FieldType::DateTime),
            ("archived", FieldType::Boolean),
        ]),
    )
}

fn ticket_stage_metadata() -> FieldType {
    FieldType::object([
        ("ticketState", FieldType::String),
        ("isClosed", FieldType::String),
    ])
}

fn deal_stage_metadata() -> FieldType {
    FieldType::object([
        ("isClosed", FieldType::Boolean),
        ("probability", FieldType::String),
    ])
}

/// Legacy v1 pipelines endpoint
fn pipelines(name: &'static str, path: &'static str, stage_metadata: FieldType) -> StreamDefinition {
    let stage = FieldType::object([
        ("label", FieldType::String),
        ("displayOrder", FieldType::Integer),
        ("metadata", stage_metadata),
        ("stageId", FieldType::String),
        ("createdAt", FieldType::Integer),
        ("updatedAt", FieldType::Integer),
        ("active", FieldType::Boolean),
    ]);

    StreamDefinition::new(
        name,
        path,
        ObjectSchema::new([
            ("label", FieldType::String),
            ("displayOrder", FieldType::Integer),
            ("active", FieldType::Boolean),
            ("stages", FieldType::array(stage)),
            ("objectType", FieldType::String),
            ("objectTypeId", FieldType::String),
            ("pipelineId", FieldType::String),
            ("createdAt", FieldType::Integer),
            ("updatedAt", FieldType::Integer),
            ("default", FieldType::Boolean),
        ]),
    )
    .primary_key(&["pipelineId"])
    .pagination(PaginationKind::Offset)
}

fn email_subscriptions() -> StreamDefinition {
    StreamDefinition::new(
        "email_subscriptions",
        "/email/public/v1/subscriptions",
        ObjectSchema::new([
            ("id", FieldType::Integer),
            ("portalId", FieldType::Integer),
            ("name", FieldType::String),
            ("description", FieldType::String),
            ("active", FieldType::Boolean),
            ("internal", FieldType::Boolean),
            ("category", FieldType::String),
            ("channel", FieldType::String),
            ("internalName", FieldType::String),
            ("businessUnitId", FieldType::Integer),
        ]),
    )
    .selector(RecordSelector::Field("subscriptionDefinitions"))
    .pagination(PaginationKind::Offset)
}

fn property_schema() -> ObjectSchema {
    let option = FieldType::object([
        ("label", FieldType::String),
        ("description", FieldType::String),
        ("value", FieldType::String),
        ("displayOrder", FieldType::Integer),
        ("hidden", FieldType::Boolean),
    ]);
    let modification = FieldType::object([
        ("readOnlyOptions", FieldType::Boolean),
        ("readOnlyValue", FieldType::Boolean),
        ("readOnlyDefinition", FieldType::Boolean),
        ("archivable", FieldType::Boolean),
    ]);

    ObjectSchema::new([
        ("updatedAt", FieldType::DateTime),
        ("createdAt", FieldType::DateTime),
        ("name", FieldType::String),
        ("label", FieldType::String),
        ("type", FieldType::String),
        ("fieldType", FieldType::String),
        ("description", FieldType::String),
        ("groupName", FieldType::String),
        ("options", FieldType::array(option)),
        ("displayOrder", FieldType::Integer),
        ("calculated", FieldType::Boolean),
        ("externalOptions", FieldType::Boolean),
        ("hasUniqueValue", FieldType::Boolean),
        ("hidden", FieldType::Boolean),
        ("hubspotDefined", FieldType::Boolean),
        ("modificationMetadata", modification),
        ("formField", FieldType::Boolean),
        ("referencedObjectType", FieldType::String),
    ])
}

/// Property definitions of every object type, merged into one table
fn properties() -> StreamDefinition {
    StreamDefinition::new(
        "properties",
        "/crm/v3/properties/{{ referencedObjectType }}",
        property_schema(),
    )
    .primary_key(&["name", "referencedObjectType"])
    .partitioned(ListRouter::new(PROPERTY_OBJECT_TYPES, "referencedObjectType"))
}

// ============================================================================
// Marketing
// ============================================================================

fn forms() -> StreamDefinition {
    StreamDefinition::new(
        "forms",
        "/marketing/v3/forms",
        ObjectSchema::new([
            ("id", FieldType::String),
            ("name", FieldType::String),
            ("formType", FieldType::String),
            ("createdAt", FieldType::DateTime),
            ("updatedAt", FieldType::DateTime),
            ("archived", FieldType::Boolean),
            ("archivedAt", FieldType::DateTime),
            ("fieldGroups", FieldType::array(FieldType::open_object())),
            ("configuration", FieldType::open_object()),
            ("displayOptions", FieldType::open_object()),
            ("legalConsentOptions", FieldType::open_object()),
        ]),
    )
}

fn form_contexts(form: &JsonObject, _now: DateTime<Utc>) -> Vec<Context> {
    record_id(form)
        .map(|id| Context::new().with("form_id", id))
        .into_iter()
        .collect()
}

/// Submissions come back newest first
fn form_submissions() -> StreamDefinition {
    StreamDefinition::new(
        "form_submissions",
        "/form-integrations/v1/submissions/forms/{{ form_id }}",
        ObjectSchema::new([
            ("form_id", FieldType::String),
            ("conversionId", FieldType::String),
            ("submittedAt", FieldType::Integer),
            ("values", FieldType::array(FieldType::open_object())),
            ("pageUrl", FieldType::String),
        ]),
    )
    .primary_key(&["form_id", "conversionId"])
    .incremental("submittedAt", SortOrder::Descending)
    .page_size(50)
    .child_of("forms", form_contexts)
}

fn campaigns() -> StreamDefinition {
    let mut properties =
        ObjectSchema::new(CAMPAIGN_PROPERTIES.iter().map(|p| (*p, FieldType::String)));
    properties.insert("hs_start_date", FieldType::Date);
    properties.insert("hs_end_date", FieldType::Date);

    StreamDefinition::new(
        "campaigns",
        "/marketing/v3/campaigns",
        ObjectSchema::new([
            ("id", FieldType::String),
            ("properties", FieldType::Object(properties)),
            ("createdAt", FieldType::String),
            ("updatedAt", FieldType::String),
        ]),
    )
    .properties(PropertySource::Fixed(&CAMPAIGN_PROPERTIES))
}

const REPORT_WINDOW_PARAMS: &[(&str, &str)] =
    &[("startDate", "{{ startDate }}"), ("endDate", "{{ endDate }}")];

fn campaign_window(campaign: &JsonObject, now: DateTime<Utc>) -> Option<Context> {
    let id = record_id(campaign)?;
    let window = trailing_years(now, CAMPAIGN_REPORT_YEARS);
    Some(
        Context::new()
            .with("campaignId", id)
            .with("startDate", window.start.format("%Y-%m-%d").to_string())
            .with("endDate", window.end.format("%Y-%m-%d").to_string()),
    )
}

fn campaign_report_contexts(campaign: &JsonObject, now: DateTime<Utc>) -> Vec<Context> {
    campaign_window(campaign, now).into_iter().collect()
}

fn campaign_asset_contexts(campaign: &JsonObject, now: DateTime<Utc>) -> Vec<Context> {
    let Some(window) = campaign_window(campaign, now) else {
        return Vec::new();
    };
    CAMPAIGN_ASSET_TYPES
        .iter()
        .map(|asset| window.clone().with("asset", *asset))
        .collect()
}

fn campaign_report(name: &'static str, path: &'static str, schema: ObjectSchema) -> StreamDefinition {
    StreamDefinition::new(name, path, schema)
        .primary_key(&["campaignId", "startDate", "endDate"])
        .selector(RecordSelector::Object)
        .pagination(PaginationKind::None)
        .params(REPORT_WINDOW_PARAMS)
        .child_of("campaigns", campaign_report_contexts)
}

fn campaign_revenue() -> StreamDefinition {
    campaign_report(
        "campaign_revenue",
        "/marketing/v3/campaigns/{{ campaignId }}/reports/revenue",
        ObjectSchema::new([
            ("campaignId", FieldType::String),
            ("startDate", FieldType::Date),
            ("endDate", FieldType::Date),
            ("currencyCode", FieldType::String),
            ("revenueAmount", FieldType::Number),
            ("dealAmount", FieldType::Number),
            ("contactsNumber", FieldType::Integer),
            ("dealsNumber", FieldType::Integer),
        ]),
    )
}

fn campaign_metrics() -> StreamDefinition {
    campaign_report(
        "campaign_metrics",
        "/marketing/v3/campaigns/{{ campaignId }}/reports/metrics",
        ObjectSchema::new([
            ("campaignId", FieldType::String),
            ("startDate", FieldType::Date),
            ("endDate", FieldType::Date),
            ("sessions", FieldType::Integer),
            ("newContactsFirstTouch", FieldType::Integer),
            ("influencedContacts", FieldType::Integer),
            ("newContactsLastTouch", FieldType::Integer),
        ]),
    )
}

fn campaign_assets() -> StreamDefinition {
    let metrics = FieldType::object(ASSET_METRICS.iter().map(|m| (*m, FieldType::Number)));

    StreamDefinition::new(
        "campaign_assets",
        "/marketing/v3/campaigns/{{ campaignId }}/assets/{{ asset }}",
        ObjectSchema::new([
            ("id", FieldType::String),
            ("name", FieldType::String),
            ("campaignId", FieldType::String),
            ("asset", FieldType::String),
            ("startDate", FieldType::Date),
            ("endDate", FieldType::Date),
            ("metrics", metrics),
        ]),
    )
    .primary_key(&["id", "campaignId", "asset"])
    .params(REPORT_WINDOW_PARAMS)
    .child_of("campaigns", campaign_asset_contexts)
}

/// A record's `id`, as a string
fn record_id(record: &JsonObject) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
