/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use serde::{Deserialize, Serialize};

use crate::common::types::*;

// Legacy FCM HTTP send
#[derive(Serialize, Debug)]
pub struct FcmSendReq<'a> {
    pub to: &'a str,
    pub priority: &'a str,
    pub data: &'a DispatchPayload,
}

#[derive(Deserialize, Debug)]
pub struct FcmSendResp {
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failure: u32,
    #[serde(default)]
    pub results: Vec<FcmSendResult>,
}

#[derive(Deserialize, Debug)]
pub struct FcmSendResult {
    pub message_id: Option<String>,
    pub error: Option<String>,
}
