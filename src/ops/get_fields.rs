// src/ops/get_fields.rs

//! Generate the `answer-csv` input for a product: apply for one case, fetch its full
//! form and write the typed header row plus an example row.

use super::{apply_product, finish};
use crate::{
    config::{load_yaml, Products},
    context::RunContext,
    dispatch::{RunOutcome, WorkItem},
    payload::{coerce::MULTI_DELIMITER, DataType, HeaderDescriptor},
    results::{write_field_template, AggregateState},
};
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::{collections::BTreeMap, fmt};
use tracing::info;

pub const FULL_FORM_ENDPOINT: &str = "/question-taskpool/api/v1/get-full-form";
pub const LOG_FILE: &str = "get_fields.log";

#[derive(Debug, Clone, clap::Args)]
pub struct GetFieldsArgs {
    /// Product key or display name from config/products.yaml
    #[arg(long)]
    pub product: String,
    /// Output CSV under answers/
    #[arg(long, default_value = "question_all_fields.csv")]
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormField {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub is_multiple_values_allowed: bool,
    #[serde(default)]
    pub is_mandatory: bool,
    /// Set when the system fills the field; such fields are not answered.
    #[serde(default)]
    pub input_source: Option<String>,
}

impl FormField {
    fn is_answerable(&self) -> bool {
        self.input_source.as_deref().map_or(true, str::is_empty)
    }

    pub fn descriptor(&self) -> HeaderDescriptor {
        HeaderDescriptor {
            name: self.field_name.clone(),
            data_type: DataType::parse(&self.data_type),
            multi: self.is_multiple_values_allowed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullForm {
    pub case_id: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub additional_fields: Vec<FormField>,
}

#[derive(Deserialize)]
struct Envelope {
    data: FullForm,
}

/// A placeholder cell showing the expected format for `header`. Unknown types get "".
pub fn example_value(header: &HeaderDescriptor) -> String {
    let (single, pair) = match header.data_type {
        DataType::Date => ("DD-MM-YYYY", ["DD-MM-YYYY"; 2]),
        DataType::DateTime => ("DD-MM-YYYY hh:mm:ss", ["DD-MM-YYYY hh:mm:ss"; 2]),
        DataType::Boolean => ("true", ["true", "false"]),
        DataType::Number => ("0", ["0"; 2]),
        DataType::File => ("test1.pdf", ["test1.pdf", "test2.pdf"]),
        DataType::Text => ("text", ["text1", "text2"]),
        DataType::Other(_) => return String::new(),
    };
    if header.multi {
        format!("{}{}{}", pair[0], MULTI_DELIMITER, pair[1])
    } else {
        single.to_string()
    }
}

/// Header and example rows over fields then additional fields, `case_id` first.
pub fn template_rows(form: &FullForm) -> (Vec<String>, Vec<String>) {
    let mut header = vec!["case_id".to_string()];
    let mut example = vec![form.case_id.clone()];
    for field in form
        .fields
        .iter()
        .chain(&form.additional_fields)
        .filter(|f| f.is_answerable())
    {
        let descriptor = field.descriptor();
        example.push(example_value(&descriptor));
        header.push(descriptor.to_string());
    }
    (header, example)
}

/// Counts over the form's main fields.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FieldSummary {
    pub total: usize,
    pub mandatory: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl FieldSummary {
    pub fn of(fields: &[FormField]) -> Self {
        let mut summary = Self {
            total: fields.len(),
            ..Self::default()
        };
        for field in fields {
            if field.is_mandatory {
                summary.mandatory += 1;
            }
            *summary.by_type.entry(field.data_type.clone()).or_default() += 1;
        }
        summary
    }
}

impl fmt::Display for FieldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Fields: {}", self.total)?;
        writeln!(f, "Mandatory Fields: {}", self.mandatory)?;
        writeln!(f, "Field Types Count:")?;
        for (data_type, n) in &self.by_type {
            writeln!(f, "- {}: {}", data_type, n)?;
        }
        Ok(())
    }
}

fn full_form(outcome: &RunOutcome) -> Result<FullForm> {
    let result = outcome
        .state
        .results
        .first()
        .ok_or_else(|| anyhow!("get-full-form was not sent"))?;
    if let Some(err) = &result.error {
        bail!("get-full-form failed with status {}: {}", result.status, err);
    }
    let envelope: Envelope =
        serde_json::from_str(&result.body).context("decoding full form response")?;
    Ok(envelope.data)
}

pub async fn run(ctx: &RunContext, args: &GetFieldsArgs) -> Result<AggregateState> {
    let products: Products = load_yaml(&ctx.layout.products_file())?;
    let product_name = products.resolve(&args.product)?.to_string();

    // ─── 1) apply for a fresh case ───────────────────────────────────
    let apply = ctx.pipeline(apply_product::policy(), LOG_FILE)?;
    let log_path = apply.log_path().to_path_buf();
    let url = ctx.url(apply_product::ENDPOINT);
    let body = json!({ "product_name": product_name }).to_string();
    let applied = apply
        .run(vec![()], move |row, ()| {
            Ok(WorkItem::new(row, Method::POST, url.as_str(), body.as_str())
                .with_detail(format!("Product: {}", product_name)))
        })
        .await;
    let Some(case_id) = apply_product::case_ids(&applied.state).into_iter().next() else {
        finish(applied, &log_path);
        bail!("apply-for-product returned no case id; see {}", log_path.display());
    };
    info!(%case_id, "case created");

    // ─── 2) fetch its full form ──────────────────────────────────────
    let url = ctx.url(FULL_FORM_ENDPOINT);
    let body = json!({ "case_id": case_id }).to_string();
    let fetched = ctx
        .pipeline(apply_product::policy(), LOG_FILE)?
        .run(vec![()], move |row, ()| {
            Ok(WorkItem::new(row, Method::POST, url.as_str(), body.as_str())
                .with_key(case_id.as_str())
                .with_detail(format!("Case ID: {}", case_id)))
        })
        .await;
    let form = full_form(&fetched);
    let state = finish(applied.followed_by(fetched), &log_path);
    let form = form?;

    // ─── 3) write the answer template ────────────────────────────────
    let (header, example) = template_rows(&form);
    let path = ctx.layout.answers_dir().join(&args.output);
    write_field_template(&path, &header, &example)?;

    let summary = FieldSummary::of(&form.fields);
    println!("_____________________\nSummary:\n{}_____________________", summary);
    info!(
        path = %path.display(),
        columns = header.len() - 1,
        fields = summary.total,
        mandatory = summary.mandatory,
        "wrote answer template"
    );
    Ok(state)
}
