/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Diesel row models for the SQLite task table. UUID-like ids and
//! dependency sets are stored as TEXT (the ids are already hex strings;
//! `deps` is a JSON-encoded array), matching the rest of the store's
//! self-describing-text convention.

use diesel::prelude::*;

use super::schema::tasks;

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbTaskRecord {
    pub id: String,
    pub quest_name: String,
    pub status: String,
    pub deps: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewDbTaskRecord {
    pub id: String,
    pub quest_name: String,
    pub status: String,
    pub deps: String,
    pub timestamp: String,
}
