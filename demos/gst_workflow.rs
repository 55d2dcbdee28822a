//! GST ledger workflow example

use gst_ledger::utils::MemoryStorage;
use gst_ledger::{
    BackfillGenerator, BackfillRun, DocumentRenderData, GstConfig, GstFilter, GstKind,
    GstLedger, Invoice, InvoiceItem, InvoiceStatus, InvoiceStorage, InvoiceSynchronizer,
    ManualEntryDraft, Period, ReturnEngine, SummaryReportData,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

fn sample_invoice(id: &str, day: u32, items: Vec<InvoiceItem>) -> Invoice {
    let created_at = NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let lines: Vec<_> = items.iter().map(InvoiceItem::line_item).collect();
    let totals = gst_ledger::compute_document_totals(&lines, BigDecimal::from(0));

    Invoice {
        id: id.to_string(),
        invoice_number: id.to_string(),
        customer_name: "Acme Traders".to_string(),
        customer_tax_id: Some("29ABCDE1234F1Z5".to_string()),
        quotation_id: None,
        status: InvoiceStatus::Sent,
        paid: None,
        items,
        round_off: None,
        subtotal: totals.subtotal,
        tax_amount: totals.tax_amount,
        total_amount: totals.total,
        invoice_date: None,
        created_at,
        updated_at: created_at,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info,gst_ledger=debug")
        .init();

    println!("🧾 GST Ledger - Workflow Example\n");

    let config = GstConfig::from_env()?;
    let storage = MemoryStorage::new();
    let sync = InvoiceSynchronizer::new(storage.clone(), &config).with_actor("demo@example.com");
    let ledger = GstLedger::new(storage.clone()).with_actor("demo@example.com");
    let returns = ReturnEngine::new(storage.clone(), config.clone());

    // 1. Save an invoice; its collected GST lands in the ledger
    println!("📄 Saving invoice INV-001...");
    let invoice = sample_invoice(
        "INV-001",
        10,
        vec![InvoiceItem::new(
            "1",
            "Widget",
            BigDecimal::from(2),
            BigDecimal::from(500),
            BigDecimal::from(18),
        )],
    );
    let saved = sync.save_invoice(&invoice).await?;
    println!("  ✓ Ledger sync: {:?}", saved.sync);

    let render = DocumentRenderData::for_invoice(&invoice);
    println!("  Subtotal: ₹{}", render.totals.subtotal);
    println!("  CGST:     ₹{}", render.totals.cgst);
    println!("  SGST:     ₹{}", render.totals.sgst);
    println!("  Total:    ₹{}", render.totals.total);
    println!();

    // 2. An imported invoice that never went through sync
    println!("📥 Importing INV-002 directly and backfilling...");
    storage
        .save_invoice(&sample_invoice(
            "INV-002",
            14,
            vec![InvoiceItem::new(
                "1",
                "Service plan",
                BigDecimal::from(1),
                BigDecimal::from(2000),
                BigDecimal::from(12),
            )],
        ))
        .await?;
    let backfill = BackfillGenerator::new(storage.clone(), &config);
    if let BackfillRun::Completed(report) = backfill.run().await? {
        println!("  ✓ Backfilled {} entr(ies)", report.created);
    }
    println!();

    // 3. Input tax from a supplier bill
    println!("🧾 Recording input tax...");
    let purchase = ledger
        .add_manual_entry(
            ManualEntryDraft::new(
                GstKind::Paid,
                BigDecimal::from(1180),
                BigDecimal::from(180),
                "Raw material purchase".to_string(),
                NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
            )
            .dealer("D-12"),
        )
        .await?;
    println!("  ✓ Entry {} ({:?})", purchase.id, purchase.payment_status);
    println!();

    // 4. Summaries and a report
    let june = Period::month(2024, 6)?;
    let summary = ledger.summary_for(&june).await?;
    println!("📊 {} summary:", summary.period);
    println!("  Collected: ₹{}", summary.collected);
    println!("  Paid:      ₹{}", summary.paid);
    println!("  Net:       ₹{}", summary.net);

    let report = ledger.report(&GstFilter::month(2024, 6)).await?;
    println!(
        "  {} record(s) across {} invoice(s)",
        report.records.len(),
        report.total_invoices
    );

    let rows = SummaryReportData::new("GST Report", &ledger.monthly_summaries().await?);
    println!("  Report net across all months: ₹{}", rows.total_net);
    println!();

    // 5. File the month
    println!("🗂️  Filing the June return...");
    let filing = returns.file_monthly_return(2024, 6).await?;
    println!("  ✓ Return {} filed, net ₹{}", filing.id, filing.net_tax);
    println!("  Due: {}", filing.due_date);

    // 6. Delete an invoice together with its ledger entry
    let removed = sync.delete_invoice("INV-001").await?;
    println!("\n🗑️  Deleted INV-001 and {} ledger entr(ies)", removed);

    println!("\n✨ Workflow complete!");
    Ok(())
}
