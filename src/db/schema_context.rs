//! Static description of the analytics schema used to ground SQL generation.

/// Tables reported by `GET /schema`
pub const TABLES: [&str; 5] = ["vendors", "customers", "invoices", "line_items", "payments"];

const SCHEMA_DESCRIPTION: &str = r#"Database Schema for Invoice Analytics:

1. vendors table:
- id: string (primary key)
- name: string (vendor name)
- email: string (optional)
- category: string (vendor category like 'Technology', 'Marketing', etc.)
- city: string, country: string

2. customers table:
- id: string (primary key)
- name: string (customer name)
- email: string (optional)
- city: string, country: string

3. invoices table:
- id: string (primary key)
- invoice_number: string (unique invoice number)
- vendor_id: string (foreign key to vendors)
- customer_id: string (foreign key to customers, optional)
- issue_date: timestamp (when invoice was issued)
- due_date: timestamp (when payment is due)
- paid_date: timestamp (when invoice was paid, null if unpaid)
- subtotal: decimal (invoice subtotal)
- tax_amount: decimal (tax amount)
- total_amount: decimal (total invoice amount)
- currency: string (default EUR)
- status: enum (PENDING, PAID, OVERDUE, CANCELLED, DRAFT)
- category: string (invoice category)

4. line_items table:
- id: string (primary key)
- invoice_id: string (foreign key to invoices)
- description: string (item description)
- quantity: decimal
- unit_price: decimal
- total_price: decimal
- category: string

5. payments table:
- id: string (primary key)
- invoice_id: string (foreign key to invoices)
- amount: decimal (payment amount)
- method: enum (BANK_TRANSFER, CREDIT_CARD, PAYPAL, CASH, CHECK, OTHER)
- paid_date: timestamp

Common queries:
- Total spend: SUM(total_amount) FROM invoices WHERE status = 'PAID'
- Top vendors: JOIN invoices with vendors, GROUP BY vendor, ORDER BY total spend
- Overdue invoices: WHERE status = 'OVERDUE' OR (status = 'PENDING' AND due_date < CURRENT_DATE)
- Monthly trends: GROUP BY EXTRACT(YEAR FROM issue_date), EXTRACT(MONTH FROM issue_date)
"#;

pub fn schema_description() -> &'static str {
    SCHEMA_DESCRIPTION
}
