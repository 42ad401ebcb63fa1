/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use crate::common::types::*;
use crate::tools::{callapi::call_api, error::AppError};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Method, Url};
use std::time::Duration;

/// Push-delivery collaborator. Implementations report success or failure per recipient.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, token: &PushToken, payload: &DispatchPayload) -> Result<(), AppError>;

    /// Results come back in the order of `messages`. One failure never affects the others.
    async fn send_batch(
        &self,
        messages: Vec<(PushToken, DispatchPayload)>,
    ) -> Vec<Result<(), AppError>> {
        join_all(
            messages
                .iter()
                .map(|(token, payload)| self.send(token, payload)),
        )
        .await
    }
}

pub struct FcmPushTransport {
    client: Client,
    url: Url,
    server_key: String,
    timeout: Duration,
}

impl FcmPushTransport {
    pub fn new(url: Url, server_key: String, timeout: Duration) -> Self {
        FcmPushTransport {
            client: Client::new(),
            url,
            server_key,
            timeout,
        }
    }
}

#[async_trait]
impl PushTransport for FcmPushTransport {
    async fn send(
        &self,
        PushToken(token): &PushToken,
        payload: &DispatchPayload,
    ) -> Result<(), AppError> {
        let authorization = format!("key={}", self.server_key);

        let resp = call_api::<FcmSendResp, FcmSendReq>(
            &self.client,
            Method::POST,
            &self.url,
            vec![
                ("content-type", "application/json"),
                ("authorization", authorization.as_str()),
            ],
            Some(FcmSendReq {
                to: token.as_str(),
                priority: "high",
                data: payload,
            }),
            self.timeout,
        )
        .await
        .map_err(|err| AppError::PushDeliveryFailed(err.message()))?;

        if resp.failure > 0 || resp.success == 0 {
            let reason = resp
                .results
                .into_iter()
                .find_map(|result| result.error)
                .unwrap_or_else(|| "UnknownFcmError".to_string());
            return Err(AppError::PushDeliveryFailed(reason));
        }

        Ok(())
    }
}
