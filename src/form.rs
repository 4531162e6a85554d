use crate::adapter::{ReadState, Record, TabularAdapter};
use crate::error::{AppendError, ValidationError, Violation};
use crate::notify::{Delivery, Notifier, notify_all};
use crate::table::Table;
use crate::transport::AppendConfirmation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Questions of the production request form, by column of the form sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Name,
    AssignedTo,
    Topic,
    Description,
    Amount,
    Unit,
    Room,
    Building,
    Zone,
    Contact,
    Recipients,
    Title,
    Submit,
    RequestDate,
    ToDate,
}

impl FormField {
    /// Fields shown to the user, in display order.
    pub const INPUTS: [FormField; 12] = [
        FormField::Name,
        FormField::AssignedTo,
        FormField::RequestDate,
        FormField::ToDate,
        FormField::Topic,
        FormField::Description,
        FormField::Amount,
        FormField::Unit,
        FormField::Room,
        FormField::Building,
        FormField::Zone,
        FormField::Contact,
    ];

    /// Column of the form sheet holding this question.
    pub fn index(self) -> usize {
        match self {
            FormField::Name => 0,
            FormField::AssignedTo => 1,
            FormField::Topic => 2,
            FormField::Description => 3,
            FormField::Amount => 4,
            FormField::Unit => 5,
            FormField::Room => 6,
            FormField::Building => 7,
            FormField::Zone => 8,
            FormField::Contact => 9,
            FormField::Recipients => 10,
            FormField::Title => 11,
            FormField::Submit => 12,
            FormField::RequestDate => 13,
            FormField::ToDate => 14,
        }
    }

    pub fn default_label(self) -> &'static str {
        match self {
            FormField::Name => "Name",
            FormField::AssignedTo => "Assigned To",
            FormField::Topic => "Topic",
            FormField::Description => "Description",
            FormField::Amount => "Amount",
            FormField::Unit => "Unit",
            FormField::Room => "Room",
            FormField::Building => "Building",
            FormField::Zone => "Zoon",
            FormField::Contact => "Contact",
            FormField::Recipients => "Chat ID",
            FormField::Title => "Production Request Form",
            FormField::Submit => "Submit",
            FormField::RequestDate => "Request Date",
            FormField::ToDate => "To Date",
        }
    }

    /// Selectors whose options come from the form sheet's column values.
    pub fn is_selector(self) -> bool {
        matches!(
            self,
            FormField::AssignedTo
                | FormField::Topic
                | FormField::Unit
                | FormField::Room
                | FormField::Building
                | FormField::Zone
        )
    }

    pub fn is_required(self) -> bool {
        !matches!(self, FormField::Description)
    }

    /// Every question in column order.
    pub const ALL: [FormField; 15] = [
        FormField::Name,
        FormField::AssignedTo,
        FormField::Topic,
        FormField::Description,
        FormField::Amount,
        FormField::Unit,
        FormField::Room,
        FormField::Building,
        FormField::Zone,
        FormField::Contact,
        FormField::Recipients,
        FormField::Title,
        FormField::Submit,
        FormField::RequestDate,
        FormField::ToDate,
    ];

    /// Default labels of every column, used to initialize a blank sheet.
    pub fn default_headers() -> Vec<String> {
        Self::ALL.iter().map(|f| f.default_label().to_string()).collect()
    }
}

/// Labels and selector options read from the form configuration sheet.
///
/// Header `i` is the label of question `i`; the non-blank values below it
/// are that question's options.
#[derive(Debug, Clone, Default)]
pub struct FormDefinition {
    table: Table,
}

impl FormDefinition {
    pub fn from_table(table: Table) -> Self {
        Self { table }
    }

    /// Label for `field`, falling back to its default when the sheet has no
    /// such column or the header is blank.
    pub fn label(&self, field: FormField) -> &str {
        self.table
            .schema()
            .label_or(field.index(), field.default_label())
    }

    pub fn options(&self, field: FormField) -> Vec<String> {
        self.table.distinct_values(field.index())
    }

    pub fn recipients(&self) -> Vec<String> {
        self.options(FormField::Recipients)
    }

    pub fn view(&self, state: ReadState) -> FormView {
        let fields = FormField::INPUTS
            .iter()
            .map(|&field| FieldView {
                field,
                label: self.label(field).to_string(),
                required: field.is_required(),
                options: if field.is_selector() {
                    self.options(field)
                } else {
                    Vec::new()
                },
            })
            .collect();

        FormView {
            title: self.label(FormField::Title).to_string(),
            submit_label: self.label(FormField::Submit).to_string(),
            fields,
            source: state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub field: FormField,
    pub label: String,
    pub required: bool,
    pub options: Vec<String>,
}

/// What the client needs to draw the form.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub title: String,
    pub submit_label: String,
    pub fields: Vec<FieldView>,
    pub source: ReadState,
}

/// One submission as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionRequest {
    pub name: String,
    pub assigned_to: String,
    pub topic: String,
    pub description: String,
    pub amount: i64,
    pub unit: String,
    pub room: String,
    pub building: String,
    pub zone: String,
    pub contact: String,
    pub request_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Link to an already-uploaded image, if any.
    pub image_url: Option<String>,
}

impl ProductionRequest {
    /// Check every required-field rule and report all that fail.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push(Violation::NameRequired);
        }
        if self.request_date.is_none() {
            violations.push(Violation::RequestDateRequired);
        }
        if self.to_date.is_none() {
            violations.push(Violation::ToDateRequired);
        }
        if self.assigned_to.is_empty() {
            violations.push(Violation::AssignedToRequired);
        }
        if self.topic.is_empty() {
            violations.push(Violation::TopicRequired);
        }
        if self.amount <= 0 {
            violations.push(Violation::AmountNotPositive);
        }
        if self.unit.is_empty() {
            violations.push(Violation::UnitRequired);
        }
        if self.room.is_empty() {
            violations.push(Violation::RoomRequired);
        }
        if self.building.is_empty() {
            violations.push(Violation::BuildingRequired);
        }
        if self.zone.is_empty() {
            violations.push(Violation::ZoneRequired);
        }
        if self.contact.trim().is_empty() {
            violations.push(Violation::ContactRequired);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }

    fn description_or_dash(&self) -> &str {
        if self.description.trim().is_empty() {
            "—"
        } else {
            &self.description
        }
    }

    fn amount_with_unit(&self) -> String {
        format!("{} {}", self.amount, self.unit)
    }

    /// Label/value pairs shown on the receipt and sent to the team.
    pub fn receipt_lines(&self, form: &FormDefinition) -> Vec<ReceiptLine> {
        let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        [
            (FormField::Name, self.name.clone()),
            (FormField::AssignedTo, self.assigned_to.clone()),
            (FormField::Topic, self.topic.clone()),
            (FormField::Description, self.description_or_dash().to_string()),
            (FormField::Amount, self.amount_with_unit()),
            (FormField::Room, self.room.clone()),
            (FormField::Building, self.building.clone()),
            (FormField::Zone, self.zone.clone()),
            (FormField::Contact, self.contact.clone()),
            (FormField::RequestDate, date(self.request_date)),
            (FormField::ToDate, date(self.to_date)),
        ]
        .into_iter()
        .map(|(field, value)| ReceiptLine {
            label: form.label(field).to_string(),
            value,
        })
        .collect()
    }

    /// The record to store, keyed by the form's labels.
    pub fn to_record(&self, form: &FormDefinition) -> Record {
        let mut record: Record = self
            .receipt_lines(form)
            .into_iter()
            .map(|line| (line.label, line.value))
            .collect();
        record
            .entry(form.label(FormField::Unit).to_string())
            .or_insert_with(|| self.unit.clone());
        record
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub label: String,
    pub value: String,
}

/// Message text sent to the team for one submission.
pub fn notification_text(lines: &[ReceiptLine]) -> String {
    let mut text = String::from("*Submission Receipt*");
    for line in lines {
        text.push_str(&format!("\n*{}:* {}", line.label, line.value));
    }
    text
}

/// Returned once the record is stored.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub id: Uuid,
    pub lines: Vec<ReceiptLine>,
    pub confirmation: AppendConfirmation,
    pub deliveries: Vec<Delivery>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request is handed back untouched so it can be shown again.
    #[error("{error}")]
    Append {
        error: AppendError,
        request: Box<ProductionRequest>,
    },
}

/// Validates, stores and announces production requests.
#[derive(Clone)]
pub struct FormCollector {
    requests: TabularAdapter,
    form: TabularAdapter,
    notifier: Option<Arc<dyn Notifier>>,
    static_recipients: Vec<String>,
    use_form_recipients: bool,
}

impl FormCollector {
    pub fn new(requests: TabularAdapter, form: TabularAdapter) -> Self {
        Self {
            requests,
            form,
            notifier: None,
            static_recipients: Vec::new(),
            use_form_recipients: true,
        }
    }

    pub fn with_notifier(
        mut self,
        notifier: Arc<dyn Notifier>,
        static_recipients: Vec<String>,
        use_form_recipients: bool,
    ) -> Self {
        self.notifier = Some(notifier);
        self.static_recipients = static_recipients;
        self.use_form_recipients = use_form_recipients;
        self
    }

    /// Form labels and options. An unreachable form sheet yields defaults.
    pub async fn definition(&self) -> (FormDefinition, ReadState) {
        let read = self.form.get_table().await;
        let state = read.state();
        (FormDefinition::from_table(read.table), state)
    }

    /// Check the form's labels against the live schema, then append.
    async fn store(
        &self,
        request: &ProductionRequest,
        form: &FormDefinition,
    ) -> Result<AppendConfirmation, AppendError> {
        let schema = self.requests.get_schema().await?;
        if !schema.is_empty() {
            let missing: Vec<String> = request
                .receipt_lines(form)
                .into_iter()
                .map(|line| line.label)
                .filter(|label| schema.position(label).is_none())
                .collect();
            if !missing.is_empty() {
                log::error!("Refusing submission, requests sheet has no column for {:?}", missing);
                return Err(AppendError::MissingColumns(missing));
            }
        }
        self.requests.append_record(&request.to_record(form), &schema).await
    }

    fn recipients(&self, form: &FormDefinition) -> Vec<String> {
        let mut seen = HashSet::new();
        let form_recipients = if self.use_form_recipients {
            form.recipients()
        } else {
            Vec::new()
        };
        self.static_recipients
            .iter()
            .cloned()
            .chain(form_recipients)
            .filter(|r| !r.trim().is_empty() && seen.insert(r.clone()))
            .collect()
    }

    /// Validate, append against the live schema, then notify.
    ///
    /// Nothing is written when validation fails, when the form sheet cannot
    /// be read, or when the live schema lacks a column for one of the form's
    /// labels. Notification runs only after a confirmed append and its
    /// failures never undo it.
    pub async fn submit(&self, request: ProductionRequest) -> Result<Receipt, SubmitError> {
        request.validate()?;

        // Labels are read fresh so they agree with the schema read below.
        let read = self.form.refresh().await;
        if let Some(error) = read.error {
            log::error!("Refusing submission, form definition unreadable: {}", error);
            return Err(SubmitError::Append {
                error: AppendError::FormUnavailable(error),
                request: Box::new(request),
            });
        }
        let form = FormDefinition::from_table(read.table);

        let confirmation = match self.store(&request, &form).await {
            Ok(confirmation) => confirmation,
            Err(error) => {
                return Err(SubmitError::Append {
                    error,
                    request: Box::new(request),
                });
            }
        };

        let lines = request.receipt_lines(&form);
        let deliveries = match &self.notifier {
            Some(notifier) => {
                let recipients = self.recipients(&form);
                notify_all(
                    notifier.as_ref(),
                    &recipients,
                    &notification_text(&lines),
                    request.image_url.as_deref().filter(|u| !u.trim().is_empty()),
                )
                .await
            }
            None => Vec::new(),
        };

        Ok(Receipt {
            id: Uuid::new_v4(),
            lines,
            confirmation,
            deliveries,
        })
    }
}
