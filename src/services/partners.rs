//! Parties and library members

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        member::{CreateMember, LibraryMember},
        partner::{CreatePartner, Partner, PartnerDetails},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct PartnersService {
    repository: Repository,
}

impl PartnersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Partner>> {
        self.repository.partners.list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Partner> {
        self.repository.partners.get_by_id(id).await
    }

    /// Get a party with the books it authored and published
    pub async fn get_details(&self, id: i32) -> AppResult<PartnerDetails> {
        let partner = self.repository.partners.get_by_id(id).await?;
        let authored_book_ids = self.repository.partners.authored_book_ids(id).await?;
        let published_book_ids = self.repository.partners.published_book_ids(id).await?;

        Ok(PartnerDetails {
            count_books: authored_book_ids.len() as i64,
            partner,
            authored_book_ids,
            published_book_ids,
        })
    }

    pub async fn create(&self, partner: CreatePartner) -> AppResult<Partner> {
        partner.validate()?;
        let created = self.repository.partners.create(&partner).await?;
        tracing::info!("Partner {} created: {}", created.id, created.name);
        Ok(created)
    }

    pub async fn list_members(&self) -> AppResult<Vec<LibraryMember>> {
        self.repository.partners.list_members().await
    }

    pub async fn get_member(&self, id: i32) -> AppResult<LibraryMember> {
        self.repository.partners.get_member(id).await
    }

    /// Enroll a party, creating it first when only its data is given
    pub async fn create_member(&self, member: CreateMember) -> AppResult<LibraryMember> {
        member.validate()?;
        if let Some(partner_id) = member.partner_id {
            self.repository.partners.get_by_id(partner_id).await?;
        }
        let created = self.repository.partners.create_member(&member).await?;
        tracing::info!("Partner {} enrolled as member {}", created.partner_id, created.id);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::{error::AppError, models::book::CreateBook};

    fn herbert() -> CreatePartner {
        CreatePartner {
            name: "Frank Herbert".to_string(),
            email: Some("frank@example.org".to_string()),
            city: None,
        }
    }

    #[tokio::test]
    async fn test_details_count_authored_books() {
        let repository = Repository::in_memory();
        let partners = PartnersService::new(repository.clone());
        let author = partners.create(herbert()).await.unwrap();

        for name in ["Dune", "Dune Messiah"] {
            repository
                .books
                .create(
                    &CreateBook {
                        name: name.to_string(),
                        author_ids: vec![author.id],
                        ..Default::default()
                    },
                    Utc::now(),
                )
                .await
                .unwrap();
        }

        let details = partners.get_details(author.id).await.unwrap();
        assert_eq!(details.count_books, 2);
        assert_eq!(details.authored_book_ids.len(), 2);
        assert!(details.published_book_ids.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_email() {
        let partners = PartnersService::new(Repository::in_memory());
        let mut partner = herbert();
        partner.email = Some("not-an-email".to_string());
        assert!(matches!(partners.create(partner).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_member_enrollment() {
        let partners = PartnersService::new(Repository::in_memory());

        let member = partners
            .create_member(CreateMember {
                partner: Some(herbert()),
                member_number: Some("M-0001".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(member.name, "Frank Herbert");
        assert_eq!(partners.list().await.unwrap().len(), 1);

        let again = partners
            .create_member(CreateMember {
                partner_id: Some(member.partner_id),
                ..Default::default()
            })
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let missing = partners.create_member(CreateMember::default()).await;
        assert!(matches!(missing, Err(AppError::Validation(_))));

        let listed = partners.list_members().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(partners.get_member(member.id).await.unwrap().partner_id, member.partner_id);
    }
}
