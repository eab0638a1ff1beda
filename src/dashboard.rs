// src/dashboard.rs
//
// One pipeline for every dashboard variant: filter → aggregate → format.
// Optional sections are switched by `ViewConfig`.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::aggregate::{
    self, AggregateRow, FunnelStage, MonthKey, PaidSpendBasis, RatioMetric, Summary,
};
use crate::analyst;
use crate::config::{DashboardConfig, ViewConfig};
use crate::fetch::{CachedLoader, DataSource};
use crate::filter::{self, FilterOptions, FilterSelection, MonthFilter};
use crate::format;
use crate::process::CampaignRecord;

/// KPI values as shown on the cards. `spend` is the spend behind the cost
/// ratios, so the card always reads as spend / volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiDisplay {
    pub spend: String,
    pub leads: String,
    pub hot_leads: String,
    pub sales: String,
    pub cost_per_lead: String,
    pub cost_per_hot_lead: String,
    pub cost_per_sale: String,
    pub conversion_rate: String,
}

impl KpiDisplay {
    pub fn of(s: &Summary) -> Self {
        Self {
            spend: format::currency(s.ratio_spend),
            leads: format::quantity(s.totals.leads),
            hot_leads: format::quantity(s.totals.hot_leads),
            sales: format::quantity(s.totals.sales),
            cost_per_lead: format::currency(s.ratios.cost_per_lead),
            cost_per_hot_lead: format::currency(s.ratios.cost_per_hot_lead),
            cost_per_sale: format::currency(s.ratios.cost_per_sale),
            conversion_rate: format::percent(s.conversion_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

/// One ratio over the month buckets, ready for a line chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub metric: RatioMetric,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Selection actually applied (organic forced on when the toggle is hidden).
    pub selection: FilterSelection,
    pub options: FilterOptions,
    pub records: usize,
    pub blended: Summary,
    pub blended_display: KpiDisplay,
    pub paid: Option<Summary>,
    pub paid_display: Option<KpiDisplay>,
    pub by_month: Vec<AggregateRow<MonthKey>>,
    pub monthly_series: Vec<MonthlySeries>,
    /// Cheapest CPL first.
    pub by_channel: Vec<AggregateRow<String>>,
    pub funnel: Vec<FunnelStage>,
    /// Text handed to the analyst.
    pub channel_summary: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DashboardOutcome {
    /// Source failed or produced nothing usable.
    NoData(String),
    /// Data exists but nothing matches the current filters.
    EmptySelection,
    Report(Box<Report>),
}

impl DashboardOutcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Report(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    views: ViewConfig,
    paid_basis: PaidSpendBasis,
    summary_ratios: Vec<RatioMetric>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            views: ViewConfig::default(),
            paid_basis: PaidSpendBasis::default(),
            summary_ratios: vec![RatioMetric::CostPerLead],
        }
    }
}

impl Dashboard {
    pub fn new(views: ViewConfig, paid_basis: PaidSpendBasis, summary_ratios: Vec<RatioMetric>) -> Self {
        Self {
            views,
            paid_basis,
            summary_ratios,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            config.views,
            config.paid_spend_basis,
            config.analyst.ratios.clone(),
        )
    }

    pub fn views(&self) -> ViewConfig {
        self.views
    }

    /// Run the pipeline over already-normalized records.
    #[instrument(level = "info", skip(self, records, selection), fields(records = records.len()))]
    pub fn compute(&self, records: &[CampaignRecord], selection: &FilterSelection) -> DashboardOutcome {
        if records.is_empty() {
            return DashboardOutcome::NoData("dataset has no valid records".into());
        }

        let mut selection = selection.clone();
        if !self.views.organic_toggle {
            selection.include_organic = true;
        }

        let filtered = filter::apply(records, &selection);
        if filtered.is_empty() {
            info!(year = selection.year, "no records match the current filters");
            return DashboardOutcome::EmptySelection;
        }

        let options = FilterOptions::for_base(
            records,
            selection.year,
            selection.month,
            selection.include_organic,
        );

        let blended = aggregate::blended(&filtered);
        let paid = self
            .views
            .paid_efficiency
            .then(|| aggregate::paid_only(&filtered, self.paid_basis));

        let by_month = aggregate::by_month(&filtered);
        let series_metrics: &[RatioMetric] = if self.views.monthly_metric_charts {
            &RatioMetric::ALL
        } else {
            &[RatioMetric::CostPerLead]
        };
        let monthly_series = series_metrics
            .iter()
            .map(|&metric| MonthlySeries {
                metric,
                points: by_month
                    .iter()
                    .map(|row| SeriesPoint {
                        label: format::month_bucket_label(row.key),
                        value: row.ratios.get(metric),
                    })
                    .collect(),
            })
            .collect();

        let mut by_channel = aggregate::by_channel(&filtered);
        aggregate::sort_by_metric(&mut by_channel, RatioMetric::CostPerLead);
        let channel_summary = analyst::channel_summary(&by_channel, &self.summary_ratios);

        info!(
            records = filtered.len(),
            months = by_month.len(),
            channels = by_channel.len(),
            "dashboard computed"
        );

        DashboardOutcome::Report(Box::new(Report {
            selection,
            options,
            records: filtered.len(),
            blended_display: KpiDisplay::of(&blended),
            paid_display: paid.as_ref().map(KpiDisplay::of),
            funnel: aggregate::funnel(&blended.totals),
            blended,
            paid,
            by_month,
            monthly_series,
            by_channel,
            channel_summary,
        }))
    }

    /// Load through `loader`, build the selection from the loaded records and
    /// compute. Load failures become [`DashboardOutcome::NoData`].
    pub async fn run<S, F>(&self, loader: &CachedLoader<S>, select: F) -> DashboardOutcome
    where
        S: DataSource,
        F: FnOnce(&[CampaignRecord]) -> Option<FilterSelection>,
    {
        let dataset = match loader.dataset().await {
            Ok(ds) => ds,
            Err(e) => {
                warn!(error = %e, "could not load campaign data");
                return DashboardOutcome::NoData(e.to_string());
            }
        };
        match select(&dataset.records) {
            Some(selection) => self.compute(&dataset.records, &selection),
            None => DashboardOutcome::NoData("dataset has no valid records".into()),
        }
    }
}

// ─── text rendering ─────────────────────────────────────────────────

fn write_kpis(f: &mut fmt::Formatter<'_>, title: &str, k: &KpiDisplay) -> fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(f, "  Investimento      {}", k.spend)?;
    writeln!(f, "  Leads             {}", k.leads)?;
    writeln!(f, "  Hotleads          {}", k.hot_leads)?;
    writeln!(f, "  Vendas            {}", k.sales)?;
    writeln!(f, "  CPL               {}", k.cost_per_lead)?;
    writeln!(f, "  CPHL              {}", k.cost_per_hot_lead)?;
    writeln!(f, "  CPV               {}", k.cost_per_sale)?;
    writeln!(f, "  Conversão         {}", k.conversion_rate)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let month = match self.selection.month {
            MonthFilter::All => format::ALL_MONTHS_LABEL,
            MonthFilter::Month(m) => format::month_name(m).unwrap_or("?"),
        };
        write!(f, "Ano {} | Mês {}", self.selection.year, month)?;
        if let Some(r) = &self.selection.date_range {
            write!(f, " | {} a {}", r.start.format("%d/%m/%Y"), r.end.format("%d/%m/%Y"))?;
        }
        writeln!(f, " | {} registros", self.records)?;
        writeln!(
            f,
            "Meses disponíveis: {}\n",
            format::month_options(&self.options.months).join(", ")
        )?;

        write_kpis(f, "Geral", &self.blended_display)?;
        if let Some(paid) = &self.paid_display {
            writeln!(f)?;
            write_kpis(f, "Mídia paga", paid)?;
        }

        writeln!(f, "\nMês          Investimento         CPL          CPHL          CPV")?;
        for row in &self.by_month {
            writeln!(
                f,
                "{:<10} {:>15} {:>12} {:>13} {:>12}",
                format::month_bucket_label(row.key),
                format::currency(row.totals.spend),
                format::currency(row.ratios.cost_per_lead),
                format::currency(row.ratios.cost_per_hot_lead),
                format::currency(row.ratios.cost_per_sale),
            )?;
        }

        writeln!(f, "\nCanal                Investimento  Leads          CPL")?;
        for row in &self.by_channel {
            writeln!(
                f,
                "{:<18} {:>15} {:>6} {:>12}",
                row.key,
                format::currency(row.totals.spend),
                format::quantity(row.totals.leads),
                format::currency(row.ratios.cost_per_lead),
            )?;
        }

        writeln!(f, "\nFunil")?;
        for stage in &self.funnel {
            writeln!(
                f,
                "  {:<10} {:>8} {:>7}",
                stage.label,
                format::quantity(stage.value),
                format::percent(stage.percent_of_initial),
            )?;
        }
        Ok(())
    }
}

/// Plain-text rendering for the terminal.
pub fn render_text(outcome: &DashboardOutcome) -> String {
    match outcome {
        DashboardOutcome::NoData(reason) => format!("Sem dados disponíveis ({reason})."),
        DashboardOutcome::EmptySelection => "Nenhum dado para os filtros atuais.".to_string(),
        DashboardOutcome::Report(r) => r.to_string(),
    }
}
