//! GraphQL documents for the checkout mutations.

/// Register a customer account.
pub const ACCOUNT_REGISTER: &str = r"
    mutation accountRegister($input: AccountRegisterInput!) {
        accountRegister(input: $input) {
            requiresConfirmation
            errors {
                field
                code
                message
            }
        }
    }
";

/// Create a session token for email and password.
pub const TOKEN_CREATE: &str = r"
    mutation tokenCreate($email: String!, $password: String!) {
        tokenCreate(email: $email, password: $password) {
            token
            refreshToken
            errors {
                field
                code
                message
            }
        }
    }
";

/// Attach the signed-in customer to a checkout.
pub const CHECKOUT_CUSTOMER_ATTACH: &str = r"
    mutation checkoutCustomerAttach($checkoutId: ID!, $languageCode: LanguageCodeEnum!) {
        checkoutCustomerAttach(id: $checkoutId) {
            checkout {
                id
                email
                lines {
                    variant {
                        product {
                            translation(languageCode: $languageCode) {
                                name
                            }
                        }
                    }
                }
            }
            errors {
                field
                code
                message
            }
        }
    }
";

/// Start a payment transaction through a payment app.
pub const TRANSACTION_INITIALIZE: &str = r"
    mutation transactionInitialize($checkoutId: ID!, $paymentGateway: PaymentGatewayToInitialize!) {
        transactionInitialize(id: $checkoutId, paymentGateway: $paymentGateway) {
            transaction {
                id
            }
            errors {
                field
                code
                message
            }
        }
    }
";

/// Turn a paid checkout into an order.
pub const CHECKOUT_COMPLETE: &str = r"
    mutation checkoutComplete($checkoutId: ID!) {
        checkoutComplete(id: $checkoutId) {
            order {
                id
            }
            errors {
                field
                code
                message
            }
        }
    }
";

/// Store the shopper's email on a checkout.
pub const CHECKOUT_EMAIL_UPDATE: &str = r"
    mutation checkoutEmailUpdate($checkoutId: ID!, $email: String!) {
        checkoutEmailUpdate(id: $checkoutId, email: $email) {
            checkout {
                id
                email
            }
            errors {
                field
                code
                message
            }
        }
    }
";
