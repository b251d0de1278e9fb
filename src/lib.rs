/*!
# CodeStreak

Backend for a "45 days of coding" challenge platform, built in Rust.

## Overview

Students receive one coding question per day, submit completions and track a
streak of consecutive active days; administrators manage users, review
aggregate statistics and bulk-import question content from spreadsheet
uploads. The service is a plain request/response JSON API with no internal
scheduler: all state lives in pluggable stores, and every operation runs
synchronously against them.

## Architecture

The service is built around two independent engines:

### Daily Assignment & Progress Engine
- Pins one question per calendar date, chosen uniformly at random on the
  first request of the day and identical for every later caller
- Records completions with same-day idempotence and consecutive-day streak
  transitions
- Derives per-difficulty statistics on every read, so they can never drift
  from the completion history

### Spreadsheet Question Importer
- Decodes CSV and XLSX/XLS uploads into a grid of raw cell values
- Maps header cells through a fixed synonym table onto canonical question
  fields
- Keeps only rows with a usable title and description, and tags each with a
  placeholder id for the later bulk save

### Persistence Layer
- `Store` traits for questions, daily assignments, progress, profiles and
  admin accounts, injected into the engines
- An in-memory implementation for tests and a JSON-file-per-collection
  implementation for production
- Conditional creates and per-user read-modify-write run atomically inside
  the store, which is what keeps racing requests convergent

## Modules

- **question**: Question and daily-assignment records
- **progress**: Completion history, streak rules and statistics
- **daily**: Daily question pinning
- **importer**: Spreadsheet upload parsing
- **store**: Store traits and their two implementations
- **admin**: Credential verification, sessions and user management
- **error**: Failure kinds and their HTTP mapping
- **app**: Routing, middleware and handlers

## REST API Endpoints

- `GET /api/student/daily-question` - Today's pinned question
- `POST /api/student/progress` - Record a completion
- `GET /api/student/progress?userId=..` - Completion history and stats
- `POST /api/profile` - Create or replace a student profile
- `POST /api/admin/login` - Administrator login
- `GET /api/admin/users`, `GET /api/admin/stats` - User listing and
  aggregates
- `POST /api/admin/users/update`, `POST /api/admin/users/delete` - User
  management
- `POST /api/admin/upload-questions` - Parse a spreadsheet upload
- `GET|POST /api/admin/questions` - List and bulk-save questions
*/

// Re-export all modules so they appear in the documentation
pub mod admin;
pub mod app;
pub mod daily;
pub mod error;
pub mod importer;
pub mod progress;
pub mod question;
pub mod store;

/// Re-export everything from these modules to make it easier to use
pub use admin::*;
pub use daily::*;
pub use error::*;
pub use progress::*;
pub use question::*;
pub use store::*;
