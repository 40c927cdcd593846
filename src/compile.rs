//! Report layout: line items + decoded invoices → [`Document`].
//!
//! The layout is fixed:
//!
//! ```text
//! Title (centred, 15 pt)
//! Intro sentence (travelers, trip dates)
//! ┌─────┬──────────┬──────┬────────┬─────────┬────────┐
//! │ No. │ Category │ Date │ Amount │ Handler │ Remark │  header, bold
//! │ 1…n │ project items                                │
//! │     │ included subsidies, date = "3天*50元/天"     │
//! │     │ Total    │      │ 123.00 │         │        │  bold
//! └─────┴──────────┴──────┴────────┴─────────┴────────┘
//! (blank line)
//! "Invoices:"
//! 1、<remark>            one caption per project item
//! [image]                only when the invoice was decoded
//! ```

use crate::calc;
use crate::config::{ExportConfig, Locale};
use crate::error::CompileError;
use crate::model::{
    Alignment, Block, Cell, CellMargins, Document, Image, Paragraph, Row, Run, Spacing, Table,
};
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::normalize::NormalizedImage;
use crate::report::{DateRange, ExpenseReport, LineItem};
use tracing::debug;

/// Twips of space above and below the title and every caption.
const BLOCK_SPACING: u32 = 100;

/// Title font size in half-points (15 pt).
const TITLE_SIZE: u32 = 30;

const COLUMN_WIDTHS: [u32; 6] = [1000, 2000, 2000, 1500, 1500, 3000];

const CELL_MARGINS: CellMargins = CellMargins {
    top: 20,
    bottom: 20,
    left: 100,
    right: 100,
};

/// Fixed text of the report in one language.
struct Labels {
    title: &'static str,
    headers: [&'static str; 6],
    total: &'static str,
    invoices: &'static str,
}

impl Labels {
    fn for_locale(locale: Locale) -> &'static Labels {
        static ZH: Labels = Labels {
            title: "出差支出说明",
            headers: ["序号", "项目", "日期", "金额", "经手人", "备注"],
            total: "以上总计",
            invoices: "发票凭证如下：",
        };
        static EN: Labels = Labels {
            title: "Trip Expense Statement",
            headers: ["No.", "Category", "Date", "Amount", "Handler", "Remark"],
            total: "Total of the above",
            invoices: "Invoices:",
        };
        match locale {
            Locale::ZhCn => &ZH,
            Locale::En => &EN,
        }
    }
}

/// Build the report document.
///
/// `images[i]` is the decoded invoice of `items[i]`, if any; the slice may
/// be shorter than `items`. Only subsidies passing [`calc::is_included`]
/// appear in the table.
///
/// # Errors
/// [`CompileError::ImageEncode`] if a decoded invoice cannot be re-encoded
/// for embedding.
pub fn build(
    report: &ExpenseReport,
    items: &[LineItem],
    subsidies: &[LineItem],
    images: &[Option<NormalizedImage>],
    config: &ExportConfig,
) -> Result<Document, CompileError> {
    let labels = Labels::for_locale(config.locale);
    let mut blocks = Vec::with_capacity(5 + items.len() * 2);

    blocks.push(Block::Paragraph(
        Paragraph::default()
            .with_run(Run::new(labels.title).size(TITLE_SIZE))
            .aligned(Alignment::Center)
            .spaced(Spacing::around(BLOCK_SPACING)),
    ));
    blocks.push(Block::Paragraph(Paragraph::text(intro(report, config.locale))));
    blocks.push(Block::Table(table(items, subsidies, labels, config)));
    blocks.push(Block::Paragraph(Paragraph::empty()));
    blocks.push(Block::Paragraph(Paragraph::text(labels.invoices)));

    for (i, item) in items.iter().enumerate() {
        let caption = format!("{}{}", caption_prefix(i + 1, config.locale), text(&item.remark));
        blocks.push(Block::Paragraph(
            Paragraph::text(caption).spaced(Spacing::around(BLOCK_SPACING)),
        ));

        if let Some(Some(image)) = images.get(i) {
            let height = calc::scaled_height(config.image_width, image.width, image.height);
            let data = encode_jpeg(image, config.jpeg_quality)?;
            debug!(
                "Item {}: embedding {}x{} invoice at {}x{}",
                i + 1,
                image.width,
                image.height,
                config.image_width,
                height
            );
            blocks.push(Block::Paragraph(Paragraph::default().with_image(Image {
                data,
                width: config.image_width,
                height,
                name: format!("invoice-{}", i + 1),
            })));
        }
    }

    Ok(Document {
        title: labels.title.to_string(),
        created: config.created,
        blocks,
    })
}

/// The sentence under the title naming travelers and trip dates.
pub fn intro(report: &ExpenseReport, locale: Locale) -> String {
    let range = report.date_range.as_ref().map(join_range).unwrap_or_default();
    match locale {
        Locale::ZhCn => format!(
            "本次出差人{}，日期{}，旅途中费用详情如下表：",
            report.travelers.join("、"),
            range.join("至")
        ),
        Locale::En => format!(
            "Travelers: {}. Dates: {}. Expenses of the trip are listed below:",
            report.travelers.join(", "),
            range.join(" to ")
        ),
    }
}

fn join_range(range: &DateRange) -> Vec<&str> {
    [range.start.as_deref(), range.end.as_deref()]
        .into_iter()
        .flatten()
        .collect()
}

fn caption_prefix(n: usize, locale: Locale) -> String {
    match locale {
        Locale::ZhCn => format!("{n}、"),
        Locale::En => format!("{n}. "),
    }
}

fn table(
    items: &[LineItem],
    subsidies: &[LineItem],
    labels: &Labels,
    config: &ExportConfig,
) -> Table {
    let mut rows = Vec::with_capacity(items.len() + subsidies.len() + 2);
    rows.push(Row::of_texts(labels.headers, true));

    for (i, item) in items.iter().enumerate() {
        rows.push(Row::of_texts(
            [
                (i + 1).to_string(),
                text(&item.category),
                text(&item.date),
                amount_cell(item.amount),
                text(&item.handler),
                text(&item.remark),
            ],
            false,
        ));
    }

    for subsidy in subsidies.iter().filter(|s| calc::is_included(s)) {
        rows.push(Row::of_texts(
            [
                String::new(),
                text(&subsidy.category),
                subsidy_rate(calc::days(subsidy), config),
                amount_cell(subsidy.amount),
                text(&subsidy.handler),
                text(&subsidy.remark),
            ],
            false,
        ));
    }

    let total = calc::total(items, subsidies);
    let mut total_row = Row::of_texts(["", "", "", "", "", ""], false);
    total_row.cells[1] = Cell::text(labels.total, true);
    total_row.cells[3] = Cell::text(total, true);
    rows.push(total_row);

    Table {
        column_widths: COLUMN_WIDTHS.to_vec(),
        width_pct: 100,
        cell_margins: CELL_MARGINS,
        rows,
    }
}

/// Date cell of a subsidy row: "3天*50元/天".
fn subsidy_rate(days: u32, config: &ExportConfig) -> String {
    let rate = calc::format_amount(config.daily_rate);
    match config.locale {
        Locale::ZhCn => format!("{days}天*{rate}元/天"),
        Locale::En => format!("{days} days × {rate}/day"),
    }
}

/// Blank for a missing or zero amount, as the entry form shows it.
fn amount_cell(amount: Option<f64>) -> String {
    match amount {
        Some(a) if a != 0.0 => calc::format_amount(a),
        _ => String::new(),
    }
}

fn text(field: &Option<String>) -> String {
    field.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Inline;
    use image::DynamicImage;

    fn report() -> ExpenseReport {
        ExpenseReport {
            travelers: vec!["张三".into(), "李四".into()],
            date_range: Some(DateRange::new("2024-01-01", "2024-01-03")),
            ..ExpenseReport::default()
        }
    }

    fn cell_text(row: &Row, col: usize) -> &str {
        match &row.cells[col].children[0].children[..] {
            [Inline::Run(run)] => &run.text,
            other => panic!("unexpected cell content {other:?}"),
        }
    }

    fn table_of(doc: &Document) -> &Table {
        doc.blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .expect("document has a table")
    }

    fn image(w: u32, h: u32) -> NormalizedImage {
        NormalizedImage::from_dynamic(DynamicImage::new_rgb8(w, h)).unwrap()
    }

    #[test]
    fn intro_joins_travelers_and_dates() {
        assert_eq!(
            intro(&report(), Locale::ZhCn),
            "本次出差人张三、李四，日期2024-01-01至2024-01-03，旅途中费用详情如下表："
        );
        assert!(intro(&ExpenseReport::default(), Locale::En).starts_with("Travelers: ."));
    }

    #[test]
    fn empty_report_has_header_and_total_only() {
        let doc = build(&report(), &[], &[], &[], &ExportConfig::default()).unwrap();
        let table = table_of(&doc);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(cell_text(&table.rows[0], 0), "序号");
        assert_eq!(cell_text(&table.rows[1], 1), "以上总计");
        assert_eq!(cell_text(&table.rows[1], 3), "0.00");
        // title, intro, table, spacer, invoice heading
        assert_eq!(doc.blocks.len(), 5);
    }

    #[test]
    fn rows_in_order_with_filtered_subsidies() {
        let items = [
            LineItem::new("火车票").with_date("2024-01-01").with_amount(120.5),
            LineItem::new("打车"),
        ];
        let subsidies = [
            LineItem::new("出差补贴")
                .with_range("2024-01-01", "2024-01-03")
                .with_amount(150.0),
            LineItem::new("出差补贴").with_range("2024-01-01", "2024-01-02"),
        ];
        let doc = build(&report(), &items, &subsidies, &[], &ExportConfig::default()).unwrap();
        let table = table_of(&doc);

        assert_eq!(table.rows.len(), 5);
        assert_eq!(cell_text(&table.rows[1], 0), "1");
        assert_eq!(cell_text(&table.rows[1], 3), "120.5");
        assert_eq!(cell_text(&table.rows[2], 0), "2");
        assert_eq!(cell_text(&table.rows[2], 3), "");
        assert_eq!(cell_text(&table.rows[3], 0), "");
        assert_eq!(cell_text(&table.rows[3], 2), "3天*50元/天");
        assert_eq!(cell_text(&table.rows[4], 3), "270.50");
        assert!(table.rows.iter().all(|r| r.cells.len() == COLUMN_WIDTHS.len()));
    }

    #[test]
    fn caption_for_every_item_image_only_when_decoded() {
        let items = [
            LineItem::new("a").with_remark("酒店"),
            LineItem::new("b").with_remark("出租车"),
        ];
        let images = [Some(image(800, 600)), None];
        let doc = build(&report(), &items, &[], &images, &ExportConfig::default()).unwrap();

        let tail = &doc.blocks[5..];
        assert_eq!(tail.len(), 3);
        let Block::Paragraph(first) = &tail[0] else { panic!() };
        assert_eq!(first.children, vec![Inline::Run(Run::new("1、酒店"))]);
        let Block::Paragraph(pic) = &tail[1] else { panic!() };
        let Inline::Image(img) = &pic.children[0] else { panic!() };
        assert_eq!((img.width, img.height), (500, 375));
        assert_eq!(&img.data[..2], &[0xFF, 0xD8]);
        let Block::Paragraph(second) = &tail[2] else { panic!() };
        assert_eq!(second.children, vec![Inline::Run(Run::new("2、出租车"))]);
    }

    #[test]
    fn english_labels() {
        let config = ExportConfig::builder().locale(Locale::En).build().unwrap();
        let subsidies = [LineItem::new("subsidy")
            .with_range("2024-01-01", "2024-01-02")
            .with_amount(100.0)];
        let doc = build(&report(), &[], &subsidies, &[], &config).unwrap();
        assert_eq!(doc.title, "Trip Expense Statement");
        let table = table_of(&doc);
        assert_eq!(cell_text(&table.rows[1], 2), "2 days × 50/day");
        assert_eq!(cell_text(&table.rows[2], 1), "Total of the above");
    }

    #[test]
    fn title_is_centred_and_sized() {
        let doc = build(&report(), &[], &[], &[], &ExportConfig::default()).unwrap();
        let Block::Paragraph(title) = &doc.blocks[0] else { panic!() };
        assert_eq!(title.alignment, Alignment::Center);
        assert_eq!(title.spacing, Some(Spacing::around(100)));
        assert_eq!(
            title.children,
            vec![Inline::Run(Run::new("出差支出说明").size(30))]
        );
    }
}
